//! `sigil-host` binary: runs the linked managed program.

use std::ffi::c_void;

use anyhow::Context;
use sigil_hostapi::{HostConfig, OpsTable};
use sigil_host::{fatal, logging, HostIo};

extern "C" {
    #[link_name = "roc__main_for_host"]
    fn managed_main(ops: *const OpsTable, ret: *mut c_void, args: *mut c_void);
}

fn real_main() -> anyhow::Result<i32> {
    let config = HostConfig::from_env();
    logging::init(&config.log_filter);

    let outcome = sigil_host::run(managed_main, std::env::args_os(), HostIo::std(), &config)
        .context("failed to start managed program")?;
    Ok(outcome.exit_code)
}

fn main() {
    match real_main() {
        Ok(code) => std::process::exit(code),
        Err(err) => fatal::abort_with(&format!("{:#}", err)),
    }
}
