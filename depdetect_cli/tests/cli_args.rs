use clap::Parser;
use depdetect_cli::{Cli, Commands};
use depdetect_core::dataset::{ChannelOrder, ConstantSamplePolicy};
use depdetect_train::{Config, TrainingConfig};
use std::path::PathBuf;

fn train(args: &[&str]) -> depdetect_cli::TrainCommand {
    let mut argv = vec!["depdetect", "train"];
    argv.extend_from_slice(args);
    match Cli::try_parse_from(argv).unwrap().command {
        Commands::Train(cmd) => cmd,
        other => panic!("expected train, got {other:?}"),
    }
}

#[test]
fn flags_override_defaults() {
    let cmd = train(&[
        "--data-dir",
        "/data",
        "--epochs",
        "10",
        "--channel-order",
        "tf",
        "--constant-samples",
        "reject",
        "--no-shuffle",
    ]);
    let config = cmd.training_config().unwrap();
    assert_eq!(config.num_epochs, 10);
    assert_eq!(config.batch_size, 8);
    assert_eq!(config.channel_order, ChannelOrder::ChannelsLast);
    assert_eq!(config.constant_samples, ConstantSamplePolicy::Reject);
    assert!(!config.shuffle);
}

#[test]
fn individual_paths_replace_directory_defaults() {
    let cmd = train(&["--data-dir", "/data", "--test-labels", "/elsewhere/y.npy"]);
    let paths = cmd.paths();
    assert_eq!(paths.train_samples, PathBuf::from("/data/train_samples.npz"));
    assert_eq!(paths.test_labels, PathBuf::from("/elsewhere/y.npy"));
}

#[test]
fn unknown_channel_order_is_refused() {
    let result = Cli::try_parse_from(["depdetect", "train", "--channel-order", "sideways"]);
    assert!(result.is_err());
}

#[test]
fn predict_requires_samples() {
    let result = Cli::try_parse_from(["depdetect", "predict", "--artifact-dir", "/runs/a"]);
    assert!(result.is_err());
}

#[test]
fn config_file_is_the_base_for_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    TrainingConfig::new()
        .with_num_epochs(7)
        .with_batch_size(3)
        .with_channel_order(ChannelOrder::ChannelsLast)
        .save(&path)
        .unwrap();

    let cmd = train(&["--config", path.to_str().unwrap(), "--batch-size", "5"]);
    let config = cmd.training_config().unwrap();
    assert_eq!(config.num_epochs, 7);
    assert_eq!(config.batch_size, 5);
    assert_eq!(config.channel_order, ChannelOrder::ChannelsLast);
}

#[test]
fn unreadable_config_file_fails() {
    let cmd = train(&["--config", "/nonexistent/run.json"]);
    assert!(cmd.training_config().is_err());
}

#[test]
fn no_shuffle_reads_environment() {
    // SAFETY: no other test in this binary reads DEPDETECT_NO_SHUFFLE without also passing --no-shuffle.
    unsafe { std::env::set_var("DEPDETECT_NO_SHUFFLE", "true") };
    let cmd = train(&[]);
    unsafe { std::env::remove_var("DEPDETECT_NO_SHUFFLE") };
    assert!(cmd.no_shuffle);
    assert!(!cmd.training_config().unwrap().shuffle);
}
