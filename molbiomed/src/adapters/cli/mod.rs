// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;

use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand, ValueEnum};

use crate::app::errors::{AppError, AppResult};
use crate::app::types::{
    BackendId, DEFAULT_BATCH_NAME, JobBatchRequest, MD_BACKENDS, MmpbsaRequest, RadiusSet,
    ResidueSelection,
};

pub mod format;

#[derive(Parser, Debug)]
#[command(
    name = "molbiomed",
    version,
    about = "Replica MD and MM-PBSA job orchestration",
    long_about = None,
    after_help = "Configuration precedence: defaults < config file < command-line flags.\n\
Config path precedence: defaults < MOLBIOMED_CONFIG_PATH < command-line flags.\n\
If --config is omitted, molbiomed tries MOLBIOMED_CONFIG_PATH, then the default config file location; missing default config is OK.\n\
Paths in the config file are resolved relative to the config file directory; paths passed as flags are resolved relative to the current working directory.\n\
Logging: MOLBIOMED_LOG (filter), MOLBIOMED_LOG_FORMAT (json|pretty|compact), MOLBIOMED_LOG_FILE."
)]
pub struct Opts {
    #[arg(
        short,
        long,
        global = true,
        value_name = "PATH",
        help = "Path to a TOML config file. When omitted, molbiomed uses MOLBIOMED_CONFIG_PATH if set, otherwise the default config file location if available."
    )]
    pub config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Base directory for batch workspaces. Overrides `workspace_dir` from the config file."
    )]
    pub workspace_dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Directory for persisted batch state. Overrides `state_dir` from the config file."
    )]
    pub state_dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Root of the protocol generator scripts. Overrides `protocols_dir` from the config file."
    )]
    pub protocols_dir: Option<PathBuf>,
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::SetTrue,
        help = "Enable debug logging. Overrides `verbose` from the config file."
    )]
    pub verbose: bool,
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Replica molecular dynamics batches.
    Md(MdArgs),
    /// MM-PBSA binding free energy jobs.
    Mmpbsa(MmpbsaArgs),
}

#[derive(Args, Debug)]
pub struct MdArgs {
    #[command(subcommand)]
    pub cmd: MdCmd,
}

#[derive(Subcommand, Debug)]
pub enum MdCmd {
    /// Prepare every replica, run the generator and submit the jobs.
    Submit(MdSubmitArgs),
    /// Download replica outputs and aggregate them into stage directories.
    Collect(MdCollectArgs),
}

#[derive(Args, Debug)]
pub struct MdSubmitArgs {
    /// Topology file (prmtop).
    #[arg(long, value_name = "PATH")]
    pub topology: PathBuf,
    /// Coordinate file (inpcrd/rst7).
    #[arg(long, value_name = "PATH")]
    pub coordinates: PathBuf,
    /// Temperature in kelvin.
    #[arg(long, default_value_t = crate::app::types::DEFAULT_TEMPERATURE_K)]
    pub temperature: f64,
    /// Production length in nanoseconds.
    #[arg(long, default_value_t = crate::app::types::DEFAULT_LENGTH_NS)]
    pub length_ns: u32,
    #[arg(long, default_value_t = crate::app::types::DEFAULT_REPLICAS)]
    pub replicas: u32,
    /// Last solute residue used for restraints. Takes precedence over --residue-selection.
    #[arg(long, value_name = "INDEX")]
    pub last_residue: Option<i64>,
    /// Residue picked interactively, as JSON: {"residue": 150, "chain": "A", "name": "LIG"}.
    #[arg(long, value_name = "JSON")]
    pub residue_selection: Option<String>,
    /// Execution backend: local, picard, csuc or slurm.
    #[arg(long, default_value = "local")]
    pub backend: String,
    #[arg(long, default_value = DEFAULT_BATCH_NAME)]
    pub batch: String,
    #[arg(long)]
    pub json: bool,
}

impl MdSubmitArgs {
    pub fn to_request(&self) -> AppResult<JobBatchRequest> {
        let residue_selection = self
            .residue_selection
            .as_deref()
            .map(|raw| {
                serde_json::from_str::<ResidueSelection>(raw).map_err(|e| {
                    AppError::InvalidArgument(format!("--residue-selection is not valid JSON: {e}"))
                })
            })
            .transpose()?;
        let mut request = JobBatchRequest::new(&self.topology, &self.coordinates);
        request.batch_name = self.batch.clone();
        request.temperature = self.temperature;
        request.length_ns = self.length_ns;
        request.replica_count = self.replicas;
        request.last_residue = self.last_residue;
        request.residue_selection = residue_selection;
        request.backend = self.backend.clone();
        Ok(request)
    }
}

#[derive(Args, Debug)]
pub struct MdCollectArgs {
    #[arg(long, default_value = DEFAULT_BATCH_NAME)]
    pub batch: String,
    /// Expected replica count. Defaults to the count recorded at submission.
    #[arg(long)]
    pub replicas: Option<u32>,
    /// Backend to assume when the batch has no recorded state.
    #[arg(long)]
    pub backend: Option<String>,
    #[arg(long)]
    pub json: bool,
}

impl MdCollectArgs {
    pub fn fallback_backend(&self) -> AppResult<BackendId> {
        match self.backend.as_deref() {
            Some(raw) => BackendId::parse_supported(raw, MD_BACKENDS),
            None => Ok(BackendId::Local),
        }
    }
}

#[derive(Args, Debug)]
pub struct MmpbsaArgs {
    #[command(subcommand)]
    pub cmd: MmpbsaCmd,
}

#[derive(Subcommand, Debug)]
pub enum MmpbsaCmd {
    /// Generate the MM-PBSA input and job script, optionally running it.
    Setup(MmpbsaSetupArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum RadiusSetArg {
    Mbondi,
    Mbondi2,
    Mbondi3,
}

impl From<RadiusSetArg> for RadiusSet {
    fn from(value: RadiusSetArg) -> Self {
        match value {
            RadiusSetArg::Mbondi => RadiusSet::Mbondi,
            RadiusSetArg::Mbondi2 => RadiusSet::Mbondi2,
            RadiusSetArg::Mbondi3 => RadiusSet::Mbondi3,
        }
    }
}

#[derive(Args, Debug)]
pub struct MmpbsaSetupArgs {
    #[arg(long, value_name = "PATH")]
    pub topology: PathBuf,
    #[arg(long, value_name = "PATH")]
    pub trajectory: PathBuf,
    #[arg(long, default_value = "MMPBSA_job")]
    pub job_name: String,
    /// Number of frames to analyse.
    #[arg(long, default_value_t = 5000)]
    pub frames: u32,
    #[arg(long, default_value = ":WAT:Na+:Cl-")]
    pub solvent_mask: String,
    #[arg(long, default_value = ":LIG")]
    pub ligand_mask: String,
    #[arg(long, default_value = "mmpbsa_output")]
    pub output_prefix: String,
    #[arg(long, value_enum, default_value_t = RadiusSetArg::Mbondi2)]
    pub radius_set: RadiusSetArg,
    /// Cluster: picard, csuc or local.
    #[arg(long, default_value = "local")]
    pub cluster: String,
    /// Run the generated script immediately.
    #[arg(long)]
    pub run_now: bool,
    #[arg(long)]
    pub json: bool,
}

impl MmpbsaSetupArgs {
    pub fn to_request(&self) -> MmpbsaRequest {
        let mut request = MmpbsaRequest::new(&self.topology, &self.trajectory);
        request.job_name = self.job_name.clone();
        request.frames = self.frames;
        request.solvent_mask = self.solvent_mask.clone();
        request.ligand_mask = self.ligand_mask.clone();
        request.output_prefix = self.output_prefix.clone();
        request.radius_set = self.radius_set.into();
        request.cluster = self.cluster.clone();
        request.run_now = self.run_now;
        request
    }
}

pub struct ParsedOpts {
    pub opts: Opts,
    pub verbose_override: Option<bool>,
}

const HELP_TEMPLATE: &str = "{before-help}{about-with-newline}{usage-heading} {usage}
{after-help}

{all-args}
";

fn apply_help_template_recursively(cmd: &mut clap::Command) {
    let mut owned = std::mem::take(cmd);
    owned = owned.help_template(HELP_TEMPLATE);
    for sub in owned.get_subcommands_mut() {
        apply_help_template_recursively(sub);
    }
    *cmd = owned;
}

pub fn cli_command() -> clap::Command {
    let mut cmd = Opts::command();
    apply_help_template_recursively(&mut cmd);
    cmd
}

pub fn parse_opts() -> ParsedOpts {
    let matches = cli_command().get_matches();
    let opts = Opts::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let verbose_override = opts.verbose.then_some(true);
    ParsedOpts {
        opts,
        verbose_override,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Opts {
        let matches = cli_command().try_get_matches_from(args).unwrap();
        Opts::from_arg_matches(&matches).unwrap()
    }

    #[test]
    fn command_definition_is_consistent() {
        cli_command().debug_assert();
    }

    #[test]
    fn md_submit_defaults() {
        let opts = parse(&[
            "molbiomed",
            "md",
            "submit",
            "--topology",
            "a.prmtop",
            "--coordinates",
            "a.inpcrd",
            "--last-residue",
            "150",
        ]);
        let Cmd::Md(MdArgs {
            cmd: MdCmd::Submit(args),
        }) = opts.cmd
        else {
            panic!("expected md submit");
        };
        let request = args.to_request().unwrap();
        assert_eq!(request.batch_name, "md_custom");
        assert_eq!(request.temperature, 300.0);
        assert_eq!(request.length_ns, 200);
        assert_eq!(request.replica_count, 1);
        assert_eq!(request.backend, "local");
        assert_eq!(request.last_residue, Some(150));
    }

    #[test]
    fn residue_selection_json_is_parsed() {
        let opts = parse(&[
            "molbiomed",
            "-v",
            "md",
            "submit",
            "--topology",
            "a.prmtop",
            "--coordinates",
            "a.inpcrd",
            "--residue-selection",
            r#"{"residue": 42, "chain": "A"}"#,
            "--backend",
            "picard",
        ]);
        assert!(opts.verbose);
        let Cmd::Md(MdArgs {
            cmd: MdCmd::Submit(args),
        }) = opts.cmd
        else {
            panic!("expected md submit");
        };
        let request = args.to_request().unwrap();
        assert_eq!(request.resolve_last_residue().unwrap(), 42);
        assert_eq!(request.backend, "picard");
    }

    #[test]
    fn malformed_selection_is_invalid_argument() {
        let opts = parse(&[
            "molbiomed",
            "md",
            "submit",
            "--topology",
            "a.prmtop",
            "--coordinates",
            "a.inpcrd",
            "--residue-selection",
            "{residue",
        ]);
        let Cmd::Md(MdArgs {
            cmd: MdCmd::Submit(args),
        }) = opts.cmd
        else {
            panic!("expected md submit");
        };
        assert!(matches!(
            args.to_request().unwrap_err(),
            AppError::InvalidArgument(_)
        ));
    }

    #[test]
    fn collect_fallback_backend_is_checked() {
        let opts = parse(&["molbiomed", "md", "collect", "--backend", "csuc", "--json"]);
        let Cmd::Md(MdArgs {
            cmd: MdCmd::Collect(args),
        }) = opts.cmd
        else {
            panic!("expected md collect");
        };
        assert_eq!(args.fallback_backend().unwrap(), BackendId::Csuc);
        assert!(args.replicas.is_none());
        assert!(args.json);

        let args = MdCollectArgs {
            batch: "x".to_string(),
            replicas: None,
            backend: Some("hpc9".to_string()),
            json: false,
        };
        assert!(args.fallback_backend().is_err());
    }

    #[test]
    fn mmpbsa_setup_maps_radius_set() {
        let opts = parse(&[
            "molbiomed",
            "mmpbsa",
            "setup",
            "--topology",
            "/d/sys.prmtop",
            "--trajectory",
            "/d/prod.nc",
            "--radius-set",
            "mbondi3",
            "--cluster",
            "csuc",
            "--run-now",
        ]);
        let Cmd::Mmpbsa(MmpbsaArgs {
            cmd: MmpbsaCmd::Setup(args),
        }) = opts.cmd
        else {
            panic!("expected mmpbsa setup");
        };
        let request = args.to_request();
        assert_eq!(request.radius_set, RadiusSet::Mbondi3);
        assert_eq!(request.cluster, "csuc");
        assert!(request.run_now);
        assert_eq!(request.frames, 5000);
    }
}
