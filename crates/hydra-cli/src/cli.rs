use clap::{Arg, ArgAction, Command, ValueHint};
use std::path::PathBuf;

/// Options shared by both subcommands.
fn common_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("cv_repetition")
            .short('r')
            .long("cv-repetition")
            .help("Number of hold-out repetitions, or the fold count for k-fold")
            .required(true)
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        Arg::new("cv_strategy")
            .long("cv-strategy")
            .help("Outer cross-validation strategy")
            .value_parser(["hold_out", "k_fold"])
            .default_value("hold_out"),
    )
    .arg(
        Arg::new("no_class_balance")
            .long("no-class-balance")
            .help("Do not weight the SVM penalty by inverse class frequency.")
            .action(ArgAction::SetTrue),
    )
    .arg(
        Arg::new("threads")
            .long("threads")
            .help("Number of worker threads. Defaults to one per core.")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        Arg::new("seed")
            .long("seed")
            .help("Seed of the data split")
            .value_parser(clap::value_parser!(u64)),
    )
    .arg(
        Arg::new("config")
            .long("config")
            .help("Path to a classification JSON configuration file. Flags override its values.")
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::FilePath),
    )
    .arg(
        Arg::new("verbose")
            .short('v')
            .long("verbose")
            .help("Log per-trial detail.")
            .action(ArgAction::SetTrue),
    )
}

pub fn build_cli() -> Command {
    Command::new("hydra")
        .version(clap::crate_version!())
        .about("Nested cross-validated classification of subject-level features")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(common_args(
            Command::new("classify")
                .about("Classify one feature table with nested cross-validation")
                .arg(
                    Arg::new("feature_tsv")
                        .help("TSV with participant_id, session_id, diagnosis and features")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output_dir")
                        .help("Directory the split and results are written to")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("voxel")
                        .long("voxel")
                        .help("Read each subject's features from the file in the 'path' column.")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("feature_selection")
                        .long("feature-selection")
                        .help("Nested feature selection method (hold_out only)")
                        .value_parser(["ANOVA", "RF", "PCA", "RFE"])
                        .ignore_case(true),
                )
                .arg(
                    Arg::new("top_k")
                        .long("top-k")
                        .help("Percentage of features retained by feature selection")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("50"),
                ),
        ))
        .subcommand(common_args(
            Command::new("multiscale")
                .about("Classify every scale of a factorization and vote across scales")
                .arg(
                    Arg::new("participant_tsv")
                        .help("TSV with participant_id, session_id and diagnosis")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("components_dir")
                        .help("Directory holding NMF/component_<c>/ tables")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("output_dir")
                        .help("Directory the split, per-scale and ensemble results are written to")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("components")
                        .long("components")
                        .help("Comma separated component counts, one per scale")
                        .required(true)
                        .value_delimiter(',')
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("voting")
                        .long("voting")
                        .help("Ensemble voting method")
                        .value_parser(["hard", "soft", "consensus"])
                        .default_value("hard"),
                )
                .arg(
                    Arg::new("table_name")
                        .long("table-name")
                        .help("File name of the component table inside each scale directory")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .default_value(hydra_classifiers::multiscale::DEFAULT_TABLE_NAME),
                ),
        ))
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
}
