//! cli::commands::run
//!
//! `ghr run view`.

use anyhow::Result;

use crate::cli::args::RunViewArgs;
use crate::cli::Factory;
use crate::run::logs::RunLogCache;
use crate::run::view::{run_view, RunViewEnv, RunViewOptions};

/// Translate `run view` flags.
pub fn run_view_options(args: RunViewArgs) -> RunViewOptions {
    RunViewOptions {
        run_id: args.run_id,
        job_id: args.job_id,
        attempt: args.attempt,
        log: args.log,
        log_failed: args.log_failed,
        web: args.web,
        exit_status: args.exit_status,
        verbose: args.verbose,
    }
}

pub fn view(factory: &Factory, args: RunViewArgs) -> Result<()> {
    let opts = run_view_options(args);
    opts.validate()?;

    let repo = factory.base_repo()?;
    let forge = factory.forge()?;
    let browser = factory.browser();
    let cache = RunLogCache::new(factory.paths.run_log_cache_dir());
    let env = RunViewEnv {
        io: &factory.io,
        forge: forge.as_ref(),
        browser: &browser,
        cache: &cache,
        repo: &repo,
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_view(&env, &opts))
}
