//! Several subcommands in one invocation, e.g. `gnetctl discover mute -m 2 set-volume --volume 50%`

use std::ffi::OsString;

/// Split `args` into one command line per subcommand
///
/// Each line starts with the program name and carries every global option,
/// wherever it appeared. Other options given before the first subcommand
/// (`--help`, `--version`) go with every line. `help` takes the rest of the
/// arguments as its own.
pub fn split<I>(cli: &clap::Command, args: I) -> Vec<Vec<OsString>>
where
    I: IntoIterator<Item = OsString>,
{
    let subcommands: Vec<&str> = cli.get_subcommands().map(|c| c.get_name()).collect();
    let globals: Vec<(&str, bool)> = cli
        .get_arguments()
        .filter(|a| a.is_global_set())
        .filter_map(|a| Some((a.get_long()?, a.get_action().takes_values())))
        .collect();

    let mut args = args.into_iter();
    let program = args
        .next()
        .unwrap_or_else(|| OsString::from(cli.get_name()));

    let mut shared = Vec::new();
    let mut leading = Vec::new();
    let mut steps: Vec<Vec<OsString>> = Vec::new();
    let mut in_help = false;

    while let Some(arg) = args.next() {
        let text = arg.to_str().unwrap_or_default();
        if !in_help {
            if let Some(takes_value) = global_option(text, &globals) {
                shared.push(arg);
                if takes_value {
                    shared.extend(args.next());
                }
                continue;
            }
            if text == "help" || subcommands.contains(&text) {
                in_help = text == "help";
                steps.push(vec![arg]);
                continue;
            }
        }
        match steps.last_mut() {
            Some(step) => step.push(arg),
            None => leading.push(arg),
        }
    }

    // No subcommand at all: let the parser report it
    if steps.is_empty() {
        steps.push(Vec::new());
    }

    steps
        .into_iter()
        .map(|step| {
            let mut line = Vec::with_capacity(1 + shared.len() + leading.len() + step.len());
            line.push(program.clone());
            line.extend(shared.iter().cloned());
            line.extend(leading.iter().cloned());
            line.extend(step);
            line
        })
        .collect()
}

/// For a global `--name` or `--name=value`, whether its value is the next argument
fn global_option(arg: &str, globals: &[(&str, bool)]) -> Option<bool> {
    let long = arg.strip_prefix("--")?;
    let (name, inline) = match long.split_once('=') {
        Some((name, _)) => (name, true),
        None => (long, false),
    };
    globals
        .iter()
        .find(|(g, _)| *g == name)
        .map(|&(_, takes_value)| takes_value && !inline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, ArgAction};
    use pretty_assertions::assert_eq;

    fn cli() -> clap::Command {
        clap::Command::new("prog")
            .arg(Arg::new("json").long("json").action(ArgAction::SetTrue).global(true))
            .arg(Arg::new("simulate").long("simulate").global(true))
            .subcommand(clap::Command::new("wakeup"))
            .subcommand(clap::Command::new("shutdown"))
            .subcommand(clap::Command::new("mute").arg(Arg::new("monitors").short('m')))
    }

    fn lines(args: &[&str]) -> Vec<Vec<String>> {
        split(&cli(), args.iter().map(OsString::from))
            .into_iter()
            .map(|line| line.into_iter().map(|a| a.into_string().unwrap()).collect())
            .collect()
    }

    #[test]
    fn one_line_per_subcommand() {
        assert_eq!(
            lines(&["prog", "wakeup", "mute", "-m", "2", "shutdown"]),
            vec![
                vec!["prog", "wakeup"],
                vec!["prog", "mute", "-m", "2"],
                vec!["prog", "shutdown"],
            ]
        );
    }

    #[test]
    fn global_options_go_to_every_line() {
        assert_eq!(
            lines(&["prog", "wakeup", "--simulate", "3", "shutdown", "--json"]),
            vec![
                vec!["prog", "--simulate", "3", "--json", "wakeup"],
                vec!["prog", "--simulate", "3", "--json", "shutdown"],
            ]
        );
        assert_eq!(
            lines(&["prog", "--simulate=2", "wakeup"]),
            vec![vec!["prog", "--simulate=2", "wakeup"]]
        );
    }

    #[test]
    fn help_and_missing_subcommands() {
        assert_eq!(
            lines(&["prog", "help", "mute"]),
            vec![vec!["prog", "help", "mute"]]
        );
        assert_eq!(lines(&["prog", "--help"]), vec![vec!["prog", "--help"]]);
        assert_eq!(lines(&["prog"]), vec![vec!["prog"]]);
    }
}
