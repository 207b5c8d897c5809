// Record selection for the ROC fill: cuts, score variables, samples, split

use crate::error::Result;
use crate::record::{read_f64, read_i64, RecordStream};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a cut
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
        }
    }

    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
        }
    }
}

/// `field op value`, written as a string in configuration (`"fj_pt > 170"`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cut {
    pub field: String,
    pub op: CmpOp,
    pub value: f64,
}

impl Cut {
    pub fn new(field: &str, op: CmpOp, value: f64) -> Self {
        Self {
            field: field.to_string(),
            op,
            value,
        }
    }

    pub fn passes(&self, stream: &dyn RecordStream, position: usize) -> Result<bool> {
        let x = read_f64(stream, position, &self.field)?;
        Ok(self.op.holds(x, self.value))
    }
}

impl FromStr for Cut {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        let [field, op, value] = parts.as_slice() else {
            return Err(format!("cut '{}' must have the form 'field op value'", s));
        };
        let op = match *op {
            ">" => CmpOp::Gt,
            ">=" => CmpOp::Ge,
            "<" => CmpOp::Lt,
            "<=" => CmpOp::Le,
            "==" => CmpOp::Eq,
            "!=" => CmpOp::Ne,
            other => return Err(format!("unknown operator '{}' in cut '{}'", other, s)),
        };
        let value: f64 = value
            .parse()
            .map_err(|_| format!("cut '{}' has a non-numeric threshold", s))?;
        Ok(Cut::new(field, op, value))
    }
}

impl TryFrom<String> for Cut {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Cut> for String {
    fn from(cut: Cut) -> Self {
        cut.to_string()
    }
}

impl fmt::Display for Cut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.op.symbol(), self.value)
    }
}

/// Every cut must pass
pub fn passes_all(cuts: &[Cut], stream: &dyn RecordStream, position: usize) -> Result<bool> {
    for cut in cuts {
        if !cut.passes(stream, position)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn default_floor() -> f64 {
    0.01
}

/// Discriminant histogrammed per sample.
///
/// `sum(numerator) / max(sum(denominator), floor)`, or just the numerator
/// sum when no denominator is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreVariable {
    pub name: String,
    pub numerator: Vec<String>,
    #[serde(default)]
    pub denominator: Vec<String>,
    #[serde(default = "default_floor")]
    pub floor: f64,
}

impl ScoreVariable {
    pub fn field(name: &str, field: &str) -> Self {
        Self {
            name: name.to_string(),
            numerator: vec![field.to_string()],
            denominator: Vec::new(),
            floor: default_floor(),
        }
    }

    pub fn ratio(name: &str, numerator: &[&str], denominator: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            numerator: numerator.iter().map(|s| s.to_string()).collect(),
            denominator: denominator.iter().map(|s| s.to_string()).collect(),
            floor: default_floor(),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.numerator
            .iter()
            .chain(&self.denominator)
            .map(String::as_str)
    }

    pub fn evaluate(&self, stream: &dyn RecordStream, position: usize) -> Result<f64> {
        let sum = |fields: &[String]| -> Result<f64> {
            fields
                .iter()
                .map(|f| read_f64(stream, position, f))
                .sum()
        };
        let numerator = sum(&self.numerator)?;
        if self.denominator.is_empty() {
            return Ok(numerator);
        }
        Ok(numerator / sum(&self.denominator)?.max(self.floor))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    Signal,
    Background,
}

/// Named category of records drawn from one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub name: String,
    pub kind: SampleKind,
    /// Name of the input the sample is drawn from
    pub input: String,
    #[serde(default)]
    pub cuts: Vec<Cut>,
}

/// Training or testing half
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SplitLabel {
    Train,
    Test,
}

impl SplitLabel {
    pub const ALL: [SplitLabel; 2] = [SplitLabel::Train, SplitLabel::Test];

    pub fn tag(self) -> &'static str {
        match self {
            SplitLabel::Train => "tr",
            SplitLabel::Test => "te",
        }
    }
}

/// Train when `field % modulus == 0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Split {
    pub field: String,
    pub modulus: i64,
}

impl Default for Split {
    fn default() -> Self {
        Self {
            field: "event_no".to_string(),
            modulus: 2,
        }
    }
}

impl Split {
    pub fn label_of(&self, value: i64) -> SplitLabel {
        if value.rem_euclid(self.modulus) == 0 {
            SplitLabel::Train
        } else {
            SplitLabel::Test
        }
    }

    pub fn label(&self, stream: &dyn RecordStream, position: usize) -> Result<SplitLabel> {
        Ok(self.label_of(read_i64(stream, position, &self.field)?))
    }
}
