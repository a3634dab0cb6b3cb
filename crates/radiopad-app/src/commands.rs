//! Console command parsing.

use anyhow::{anyhow, bail, Context, Result};

/// One line typed at the prompt. Sound numbers are 1-based as printed.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Play(usize),
    Toggle(usize),
    Stop,
    Seek(f64),
    /// Volume in percent.
    Volume(f64),
    Status,
    List,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  play N     start sound N
  toggle N   play/pause sound N
  stop       pause and rewind
  seek S     jump to S seconds
  vol V      set volume to V percent
  status     show the player state
  list       show the sounds
  quit       exit";

impl Input {
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            bail!("empty command");
        };
        let arg = words.next();
        if words.next().is_some() {
            bail!("too many arguments");
        }

        let input = match verb.to_ascii_lowercase().as_str() {
            "play" | "p" => Self::Play(sound_number(arg)?),
            "toggle" | "t" => Self::Toggle(sound_number(arg)?),
            "stop" | "s" => Self::Stop,
            "seek" => Self::Seek(number(arg, "seconds")?),
            "vol" | "volume" => Self::Volume(number(arg, "percent")?),
            "status" | "st" => Self::Status,
            "list" | "ls" => Self::List,
            "help" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            other => bail!("unknown command {other:?}, try 'help'"),
        };
        Ok(input)
    }
}

fn sound_number(arg: Option<&str>) -> Result<usize> {
    let arg = arg.ok_or_else(|| anyhow!("missing sound number"))?;
    let n: usize = arg
        .parse()
        .with_context(|| format!("{arg:?} is not a sound number"))?;
    if n == 0 {
        bail!("sounds are numbered from 1");
    }
    Ok(n)
}

fn number(arg: Option<&str>, what: &str) -> Result<f64> {
    let arg = arg.ok_or_else(|| anyhow!("missing {what}"))?;
    arg.parse()
        .with_context(|| format!("{arg:?} is not a number of {what}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Input::parse("play 3").unwrap(), Input::Play(3));
        assert_eq!(Input::parse("  T 1 ").unwrap(), Input::Toggle(1));
        assert_eq!(Input::parse("stop").unwrap(), Input::Stop);
        assert_eq!(Input::parse("seek 12.5").unwrap(), Input::Seek(12.5));
        assert_eq!(Input::parse("vol 40").unwrap(), Input::Volume(40.0));
        assert_eq!(Input::parse("status").unwrap(), Input::Status);
        assert_eq!(Input::parse("q").unwrap(), Input::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Input::parse("").is_err());
        assert!(Input::parse("play").is_err());
        assert!(Input::parse("play 0").is_err());
        assert!(Input::parse("play two").is_err());
        assert!(Input::parse("seek 1 2").is_err());
        assert!(Input::parse("rewind").is_err());
    }
}
