use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const PORT_NEXT: &str = "next";
pub const PORT_YES: &str = "yes";
pub const PORT_NO: &str = "no";
pub const RANDOM_PORTS: [&str; 4] = ["path1", "path2", "path3", "path4"];

pub const MIN_RANDOM_PATHS: usize = 2;
pub const MAX_RANDOM_PATHS: usize = 4;

/// The closed set of node kinds a flow graph can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Start,
    End,
    Effect,
    Condition,
    Delay,
    Loop,
    Random,
    Variable,
    Target,
    Math,
    SkipCooldown,
}

impl NodeKind {
    pub const ALL: [NodeKind; 11] = [
        NodeKind::Start,
        NodeKind::End,
        NodeKind::Effect,
        NodeKind::Condition,
        NodeKind::Delay,
        NodeKind::Loop,
        NodeKind::Random,
        NodeKind::Variable,
        NodeKind::Target,
        NodeKind::Math,
        NodeKind::SkipCooldown,
    ];

    /// The persisted type name, e.g. `SKIP_COOLDOWN`.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Start => "START",
            NodeKind::End => "END",
            NodeKind::Effect => "EFFECT",
            NodeKind::Condition => "CONDITION",
            NodeKind::Delay => "DELAY",
            NodeKind::Loop => "LOOP",
            NodeKind::Random => "RANDOM",
            NodeKind::Variable => "VARIABLE",
            NodeKind::Target => "TARGET",
            NodeKind::Math => "MATH",
            NodeKind::SkipCooldown => "SKIP_COOLDOWN",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            NodeKind::Start => "Start",
            NodeKind::End => "End",
            NodeKind::Effect => "Effect",
            NodeKind::Condition => "Condition",
            NodeKind::Delay => "Delay",
            NodeKind::Loop => "Loop",
            NodeKind::Random => "Random",
            NodeKind::Variable => "Variable",
            NodeKind::Target => "Target",
            NodeKind::Math => "Math",
            NodeKind::SkipCooldown => "Skip Cooldown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeKind::End)
    }

    /// Output ports for every kind except Random, whose ports depend on `pathCount`.
    pub fn fixed_ports(&self) -> &'static [&'static str] {
        match self {
            NodeKind::End => &[],
            NodeKind::Condition => &[PORT_YES, PORT_NO],
            NodeKind::Random => &RANDOM_PORTS,
            _ => &[PORT_NEXT],
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Unknown names are reported with the offending text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownName(pub String);

impl fmt::Display for UnknownName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown name '{}'", self.0)
    }
}

impl std::error::Error for UnknownName {}

// Accept `NEAREST_PLAYER`, `nearestPlayer`, `Nearest Player` alike.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_uppercase)
        .collect()
}

impl FromStr for NodeKind {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        NodeKind::ALL
            .into_iter()
            .find(|k| normalize(k.as_str()) == wanted)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

macro_rules! named_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownName;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = normalize(s);
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| normalize(v.as_str()) == wanted)
                    .ok_or_else(|| UnknownName(s.to_string()))
            }
        }
    };
}

named_enum!(
    /// How a Loop node repeats its body.
    LoopMode {
        Count => "COUNT",
        While => "WHILE",
    }
);

named_enum!(
    /// Operation a Variable node applies to its named variable.
    VariableOp {
        Set => "SET",
        Add => "ADD",
        Subtract => "SUBTRACT",
        Multiply => "MULTIPLY",
        Divide => "DIVIDE",
    }
);

named_enum!(
    /// Who a Target node selects. `Caster` is the acting player.
    TargetType {
        Caster => "SELF",
        Victim => "VICTIM",
        NearestPlayer => "NEAREST_PLAYER",
        NearestHostile => "NEAREST_HOSTILE",
        NearestEntity => "NEAREST_ENTITY",
        RandomPlayer => "RANDOM_PLAYER",
    }
);

named_enum!(
    MathOp {
        Add => "ADD",
        Subtract => "SUBTRACT",
        Multiply => "MULTIPLY",
        Divide => "DIVIDE",
        Modulo => "MODULO",
        Min => "MIN",
        Max => "MAX",
        Abs => "ABS",
        Round => "ROUND",
        Floor => "FLOOR",
        Ceil => "CEIL",
        Random => "RANDOM",
        Power => "POWER",
        Sqrt => "SQRT",
    }
);

impl MathOp {
    /// Operator symbol for traces; named operations fall back to their name.
    pub fn symbol(&self) -> &'static str {
        match self {
            MathOp::Add => "+",
            MathOp::Subtract => "-",
            MathOp::Multiply => "*",
            MathOp::Divide => "/",
            MathOp::Modulo => "%",
            MathOp::Power => "^",
            other => other.as_str(),
        }
    }
}
