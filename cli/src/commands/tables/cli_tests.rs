//! CLI parsing tests for tables command.

#[cfg(test)]
mod tests {
    use crate::cli::Args;
    use crate::commands::Command;
    use clap::Parser;
    use rstest::rstest;

    #[rstest]
    #[case::default(&["litequery", "tables"], false)]
    #[case::views(&["litequery", "tables", "--views"], true)]
    fn test_views_flag(#[case] argv: &[&str], #[case] expected: bool) {
        let args = Args::try_parse_from(argv).unwrap();
        match args.command {
            Command::Tables(cmd) => assert_eq!(cmd.views, expected),
            other => panic!("Expected Tables, got {:?}", other),
        }
    }
}
