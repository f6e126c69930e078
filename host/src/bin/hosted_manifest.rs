//! Prints the hosted function declarations in table order.
//!
//! The managed-side module must declare its hosted functions in exactly this
//! order; diff its declaration block against this output.

use std::io::Write;

use sigil_hostapi::HostedFn;

fn main() -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    for line in HostedFn::manifest() {
        writeln!(out, "{}", line)?;
    }
    out.flush()?;
    Ok(())
}
