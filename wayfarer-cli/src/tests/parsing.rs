//! Argument parsing for each subcommand.

use super::*;
use rstest::rstest;
use wayfarer_core::EntityKind;

fn parse(args: &[&str]) -> Result<Command, clap::Error> {
    Cli::try_parse_from(args).map(|cli| cli.command)
}

#[rstest]
fn near_accepts_negative_coordinates() {
    let command = parse(&["wayfarer", "near", "--lon", "-0.1276", "--lat", "-51.5"])
        .expect("near should parse");
    match command {
        Command::Near(args) => {
            assert_eq!(args.lon, Some(-0.1276));
            assert_eq!(args.lat, Some(-51.5));
            assert_eq!(args.distance, None);
        }
        other => panic!("expected near, found {other:?}"),
    }
}

#[rstest]
fn bbox_reads_all_four_edges() {
    let command = parse(&[
        "wayfarer",
        "bbox",
        "--min-lon",
        "-1",
        "--min-lat",
        "50",
        "--max-lon",
        "1",
        "--max-lat",
        "52",
        "--database",
        "map.db",
    ])
    .expect("bbox should parse");
    match command {
        Command::Bbox(args) => {
            assert_eq!(
                (args.min_lon, args.min_lat, args.max_lon, args.max_lat),
                (Some(-1.0), Some(50.0), Some(1.0), Some(52.0))
            );
            assert_eq!(args.database.as_deref().map(|path| path.as_str()), Some("map.db"));
        }
        other => panic!("expected bbox, found {other:?}"),
    }
}

#[rstest]
#[case("node", EntityKind::Node)]
#[case("way", EntityKind::Way)]
#[case("relation", EntityKind::Relation)]
fn clear_parses_the_kind(#[case] raw: &str, #[case] expected: EntityKind) {
    let command = parse(&["wayfarer", "clear", "--kind", raw]).expect("clear should parse");
    match command {
        Command::Clear(args) => assert_eq!(args.kind, Some(expected)),
        other => panic!("expected clear, found {other:?}"),
    }
}

#[rstest]
fn clear_rejects_unknown_kinds() {
    let err = parse(&["wayfarer", "clear", "--kind", "river"]).expect_err("unknown kind");
    assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
}

#[rstest]
#[case("summarise")]
#[case("speed-limits")]
fn database_only_commands_parse_without_flags(#[case] name: &str) {
    let command = parse(&["wayfarer", name]).expect("command should parse");
    assert!(matches!(
        command,
        Command::Summarise(SummariseArgs { database: None })
            | Command::SpeedLimits(SpeedLimitsArgs { database: None })
    ));
}
