use memecam_core::camera::domain::camera_config::FlashMode;

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Next,
    Select(String),
    Clear,
    Switch,
    Zoom(f64),
    Pinch(f64),
    Flash(FlashMode),
    Detect(bool),
    Capture,
    State,
    Stats,
    Start,
    Stop,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  next                 cycle to the next overlay
  select <name>        select an overlay by name
  clear                hide the overlay
  switch               switch between front and back camera
  zoom <x>             set digital zoom
  pinch <scale>        apply a pinch gesture relative to the current zoom
  flash on|off|auto    set flash mode
  detect on|off        enable or disable face detection
  capture              capture a still
  state | stats        show session state or counters
  start | stop         start or stop the camera
  quit";

impl std::str::FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or("empty command")?.to_ascii_lowercase();
        let arg = parts.next();
        let required = || arg.ok_or_else(|| format!("'{verb}' needs an argument"));

        let command = match verb.as_str() {
            "next" | "n" => Command::Next,
            "select" => Command::Select(required()?.to_string()),
            "clear" => Command::Clear,
            "switch" => Command::Switch,
            "zoom" => Command::Zoom(parse_number(required()?)?),
            "pinch" => Command::Pinch(parse_number(required()?)?),
            "flash" => Command::Flash(required()?.parse()?),
            "detect" => Command::Detect(parse_switch(required()?)?),
            "capture" | "snap" => Command::Capture,
            "state" => Command::State,
            "stats" => Command::Stats,
            "start" => Command::Start,
            "stop" => Command::Stop,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(format!("unknown command '{other}' (try 'help')")),
        };
        Ok(command)
    }
}

fn parse_number(s: &str) -> Result<f64, String> {
    s.parse().map_err(|_| format!("'{s}' is not a number"))
}

fn parse_switch(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(format!("expected on or off, got '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("next", Command::Next)]
    #[case("select doge", Command::Select("doge".into()))]
    #[case("  ZOOM 2.5 ", Command::Zoom(2.5))]
    #[case("pinch 0.5", Command::Pinch(0.5))]
    #[case("flash auto", Command::Flash(FlashMode::Auto))]
    #[case("detect off", Command::Detect(false))]
    #[case("capture", Command::Capture)]
    #[case("q", Command::Quit)]
    fn test_parse(#[case] line: &str, #[case] expected: Command) {
        assert_eq!(line.parse::<Command>().unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("select")]
    #[case("zoom wide")]
    #[case("flash sometimes")]
    #[case("detect maybe")]
    #[case("dance")]
    fn test_parse_errors(#[case] line: &str) {
        assert!(line.parse::<Command>().is_err());
    }
}
