use serde::{Deserialize, Serialize};

/// Tiling direction of a workspace or split container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    #[default]
    Horizontal,
    Vertical,
}

impl Layout {
    pub fn toggled(self) -> Layout {
        match self {
            Layout::Horizontal => Layout::Vertical,
            Layout::Vertical => Layout::Horizontal,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// The layout whose axis this direction travels along.
    pub fn layout(self) -> Layout {
        match self {
            Direction::Left | Direction::Right => Layout::Horizontal,
            Direction::Up | Direction::Down => Layout::Vertical,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Whether travelling this way moves towards lower child indices.
    pub fn is_backward(self) -> bool { matches!(self, Direction::Left | Direction::Up) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CycleDirection {
    Next,
    Prev,
}

impl CycleDirection {
    pub fn step(self, i: usize, len: usize) -> usize {
        match self {
            CycleDirection::Next => (i + 1) % len,
            CycleDirection::Prev => (i + len - 1) % len,
        }
    }

    /// The monitor direction used when cycling leaves the current workspace.
    pub fn monitor_direction(self) -> Direction {
        match self {
            CycleDirection::Next => Direction::Right,
            CycleDirection::Prev => Direction::Left,
        }
    }
}

impl From<Direction> for CycleDirection {
    fn from(direction: Direction) -> Self {
        if direction.is_backward() { CycleDirection::Prev } else { CycleDirection::Next }
    }
}

/// Axis a resize command acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Width,
    Height,
}

impl Dimension {
    pub fn layout(self) -> Layout {
        match self {
            Dimension::Width => Layout::Horizontal,
            Dimension::Height => Layout::Vertical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod direction_operations {
        use super::*;

        #[test]
        fn direction_layout() {
            assert_eq!(Layout::Horizontal, Direction::Left.layout());
            assert_eq!(Layout::Horizontal, Direction::Right.layout());
            assert_eq!(Layout::Vertical, Direction::Up.layout());
            assert_eq!(Layout::Vertical, Direction::Down.layout());
        }

        #[test]
        fn direction_opposite() {
            assert_eq!(Direction::Right, Direction::Left.opposite());
            assert_eq!(Direction::Left, Direction::Right.opposite());
            assert_eq!(Direction::Down, Direction::Up.opposite());
            assert_eq!(Direction::Up, Direction::Down.opposite());
        }

        #[test]
        fn direction_parses_from_str() {
            assert_eq!(Ok(Direction::Up), "up".parse());
            assert!("sideways".parse::<Direction>().is_err());
        }
    }

    mod cycle_operations {
        use super::*;

        #[test]
        fn step_wraps() {
            assert_eq!(0, CycleDirection::Next.step(4, 5));
            assert_eq!(4, CycleDirection::Prev.step(0, 5));
            assert_eq!(2, CycleDirection::Next.step(1, 5));
        }

        #[test]
        fn from_direction() {
            assert_eq!(CycleDirection::Prev, Direction::Up.into());
            assert_eq!(CycleDirection::Next, Direction::Right.into());
        }
    }

    #[test]
    fn layout_toggles() {
        assert_eq!(Layout::Vertical, Layout::Horizontal.toggled());
        assert_eq!(Layout::Horizontal, Layout::Horizontal.toggled().toggled());
        assert_eq!("vertical", Layout::Vertical.to_string());
    }
}
