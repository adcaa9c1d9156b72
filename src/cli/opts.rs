//! Command-line options
use crate::config::SweepConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(version, author, about)]
pub struct Opts {
    #[clap(long)]
    /// JSON sweep configuration; missing fields take their default values
    pub config: Option<PathBuf>,

    #[clap(long)]
    /// Random seed for pair sampling and weight initialization
    pub seed: Option<u64>,

    #[clap(long)]
    /// Directory under which datasets, pairs, models and logs are stored
    pub root: Option<PathBuf>,

    #[clap(long)]
    /// Environment the dataset was recorded in
    pub env_name: Option<String>,

    #[clap(long)]
    /// Experiment name
    pub exp_name: Option<String>,
}

impl Opts {
    /// Sweep configuration from `--config` (or the defaults) with the other options applied on top.
    pub fn sweep_config(&self) -> Result<SweepConfig, serde_json::Error> {
        let mut sweep = match &self.config {
            Some(path) => SweepConfig::from_json_file(path)?,
            None => SweepConfig::default(),
        };
        self.update(&mut sweep);
        Ok(sweep)
    }

    fn update(&self, sweep: &mut SweepConfig) {
        if let Some(seed) = self.seed {
            sweep.seed = seed;
        }
        let experiment = &mut sweep.experiment;
        if let Some(root) = &self.root {
            experiment.root = root.clone();
        }
        if let Some(env_name) = &self.env_name {
            experiment.env_name = env_name.clone();
        }
        if let Some(exp_name) = &self.exp_name {
            experiment.exp_name = exp_name.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn no_arguments_gives_defaults() {
        let opts = Opts::try_parse_from(["pref-experiment"]).unwrap();
        assert_eq!(opts.sweep_config().unwrap(), SweepConfig::default());
    }

    #[rstest]
    #[case(&["--seed", "7"], 7, ".", "maze2d-medium-dense-v1")]
    #[case(&["--root", "/data", "--env-name", "hopper"], 0, "/data", "hopper")]
    #[case(&["--seed=3", "--exp-name", "small"], 3, ".", "maze2d-medium-dense-v1")]
    fn overrides(
        #[case] args: &[&str],
        #[case] seed: u64,
        #[case] root: &str,
        #[case] env_name: &str,
    ) {
        let opts =
            Opts::try_parse_from(std::iter::once("pref-experiment").chain(args.iter().copied()))
                .unwrap();
        let sweep = opts.sweep_config().unwrap();
        assert_eq!(sweep.seed, seed);
        assert_eq!(sweep.experiment.root, PathBuf::from(root));
        assert_eq!(sweep.experiment.env_name, env_name);
    }

    #[test]
    fn seed_overrides_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sweep.json");
        fs::write(&path, r#"{"seed": 5, "model_tag": "small"}"#).unwrap();

        let path_arg = path.to_string_lossy().into_owned();
        let opts = Opts::try_parse_from(["pref-experiment", "--config", &path_arg]).unwrap();
        let sweep = opts.sweep_config().unwrap();
        assert_eq!(sweep.seed, 5);
        assert_eq!(sweep.model_tag, "small");

        let opts =
            Opts::try_parse_from(["pref-experiment", "--config", &path_arg, "--seed", "9"])
                .unwrap();
        let sweep = opts.sweep_config().unwrap();
        assert_eq!(sweep.seed, 9);
        assert_eq!(sweep.model_tag, "small");
    }

    #[rstest]
    #[case(&["--seed", "-1"])]
    #[case(&["--seed", "many"])]
    #[case(&["config.json"])]
    fn rejects_bad_arguments(#[case] args: &[&str]) {
        let parsed =
            Opts::try_parse_from(std::iter::once("pref-experiment").chain(args.iter().copied()));
        assert!(parsed.is_err());
    }

    #[test]
    fn missing_config_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let opts = Opts {
            config: Some(path),
            seed: None,
            root: None,
            env_name: None,
            exp_name: None,
        };
        assert!(opts.sweep_config().is_err());
    }
}
