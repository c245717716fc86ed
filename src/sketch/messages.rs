#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    Clear,
}

impl Command {
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            'q' => Some(Self::Quit),
            'c' => Some(Self::Clear),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Quit,
}

#[cfg(test)]
mod tests {
    use super::Command;

    #[test]
    fn only_q_and_c_are_commands() {
        assert_eq!(Command::from_key('q'), Some(Command::Quit));
        assert_eq!(Command::from_key('c'), Some(Command::Clear));
        assert_eq!(Command::from_key('Q'), None);
        assert_eq!(Command::from_key('x'), None);
    }
}
