use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Coefficients of an explicit Runge-Kutta method.
///
/// `a` is strictly lower triangular and stored by row: `a[i]` holds the
/// `i` coefficients that combine stages `0..i` into the input of stage `i`.
/// Embedded pairs carry `error` = b − b̂, the weights of the local error
/// estimate.
#[derive(Debug)]
pub struct ButcherTableau {
    pub name: &'static str,
    pub order: usize,
    pub embedded_order: Option<usize>,
    pub c: &'static [f64],
    pub a: &'static [&'static [f64]],
    pub b: &'static [f64],
    pub error: Option<&'static [f64]>,
}

impl ButcherTableau {
    pub fn stages(&self) -> usize {
        self.b.len()
    }

    pub fn is_embedded(&self) -> bool {
        self.error.is_some()
    }

    /// Order used by the step-size controller: the lower of the pair.
    pub fn controller_order(&self) -> usize {
        match self.embedded_order {
            Some(embedded) => embedded.min(self.order),
            None => self.order,
        }
    }

    /// Number of leading stages that contribute to the solution update.
    pub(crate) fn solution_stages(&self) -> usize {
        self.b
            .iter()
            .rposition(|&w| w != 0.0)
            .map_or(0, |last| last + 1)
    }
}

pub static FORWARD_EULER: ButcherTableau = ButcherTableau {
    name: "rk1fe",
    order: 1,
    embedded_order: None,
    c: &[0.0],
    a: &[&[]],
    b: &[1.0],
    error: None,
};

/// Heun's method.
pub static HEUN: ButcherTableau = ButcherTableau {
    name: "rk2a",
    order: 2,
    embedded_order: None,
    c: &[0.0, 1.0],
    a: &[&[], &[1.0]],
    b: &[0.5, 0.5],
    error: None,
};

/// Bogacki-Shampine 3(2).
pub static BOGACKI_SHAMPINE: ButcherTableau = ButcherTableau {
    name: "rk3bs",
    order: 3,
    embedded_order: Some(2),
    c: &[0.0, 0.5, 0.75, 1.0],
    a: &[
        &[],
        &[0.5],
        &[0.0, 0.75],
        &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0],
    ],
    b: &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0, 0.0],
    error: Some(&[-5.0 / 72.0, 1.0 / 12.0, 1.0 / 9.0, -1.0 / 8.0]),
};

pub static CLASSIC_RK4: ButcherTableau = ButcherTableau {
    name: "rk4",
    order: 4,
    embedded_order: None,
    c: &[0.0, 0.5, 0.5, 1.0],
    a: &[&[], &[0.5], &[0.0, 0.5], &[0.0, 0.0, 1.0]],
    b: &[1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
    error: None,
};

/// Dormand-Prince 5(4).
pub static DORMAND_PRINCE: ButcherTableau = ButcherTableau {
    name: "rk5dp",
    order: 5,
    embedded_order: Some(4),
    c: &[0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0],
    a: &[
        &[],
        &[1.0 / 5.0],
        &[3.0 / 40.0, 9.0 / 40.0],
        &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
        &[19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0],
        &[
            9017.0 / 3168.0,
            -355.0 / 33.0,
            46732.0 / 5247.0,
            49.0 / 176.0,
            -5103.0 / 18656.0,
        ],
        &[
            35.0 / 384.0,
            0.0,
            500.0 / 1113.0,
            125.0 / 192.0,
            -2187.0 / 6784.0,
            11.0 / 84.0,
        ],
    ],
    b: &[
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
        0.0,
    ],
    error: Some(&[
        71.0 / 57600.0,
        0.0,
        -71.0 / 16695.0,
        71.0 / 1920.0,
        -17253.0 / 339200.0,
        22.0 / 525.0,
        -1.0 / 40.0,
    ]),
};

/// Tsitouras 5(4).
pub static TSITOURAS: ButcherTableau = ButcherTableau {
    name: "tsit5",
    order: 5,
    embedded_order: Some(4),
    c: &[0.0, 0.161, 0.327, 0.9, 0.9800255409045097, 1.0, 1.0],
    a: &[
        &[],
        &[0.161],
        &[-0.008480655492356989, 0.335480655492357],
        &[2.898, -6.359447987781783, 4.361447987781783],
        &[
            5.325864858437957,
            -11.748883564062828,
            7.495539342889693,
            -0.09249506636030195,
        ],
        &[
            5.86145544294642,
            -12.92096931784711,
            8.159367898576159,
            -0.071584973281401,
            -0.02826857949054663,
        ],
        &[
            0.09646076681806523,
            0.01,
            0.4798896504144996,
            1.379008574103742,
            -3.290069515436099,
            2.324710524099774,
        ],
    ],
    b: &[
        0.09646076681806523,
        0.01,
        0.4798896504144996,
        1.379008574103742,
        -3.290069515436099,
        2.324710524099774,
        0.0,
    ],
    error: Some(&[
        -0.0017800110522257772,
        -0.0008164344596567469,
        0.007880878010261995,
        -0.1447110071732629,
        0.5823571654525552,
        -0.45808210592918697,
        0.015151515151515152,
    ]),
};

/// Selects one of the built-in tableaux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RkMethod {
    Rk1fe,
    Rk2a,
    Rk3bs,
    #[default]
    Rk4,
    Rk5dp,
    Tsit5,
}

impl RkMethod {
    pub const ALL: [RkMethod; 6] = [
        RkMethod::Rk1fe,
        RkMethod::Rk2a,
        RkMethod::Rk3bs,
        RkMethod::Rk4,
        RkMethod::Rk5dp,
        RkMethod::Tsit5,
    ];

    pub fn tableau(self) -> &'static ButcherTableau {
        match self {
            RkMethod::Rk1fe => &FORWARD_EULER,
            RkMethod::Rk2a => &HEUN,
            RkMethod::Rk3bs => &BOGACKI_SHAMPINE,
            RkMethod::Rk4 => &CLASSIC_RK4,
            RkMethod::Rk5dp => &DORMAND_PRINCE,
            RkMethod::Tsit5 => &TSITOURAS,
        }
    }
}

impl fmt::Display for RkMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tableau().name)
    }
}

impl FromStr for RkMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        RkMethod::ALL
            .into_iter()
            .find(|m| m.tableau().name == lower)
            .ok_or_else(|| {
                Error::config(format!(
                    "unknown Runge-Kutta method '{s}' (expected one of rk1fe, rk2a, rk3bs, rk4, rk5dp, tsit5)"
                ))
            })
    }
}
