use std::path::Path;

use anyhow::Result;

use packline_engine::load_pack_dir;
use packline_verify::{verify_pack, PackVerifyOptions};

use crate::output;

pub fn run(dir: &str, no_deep: bool, no_refs: bool) -> Result<i32> {
    let contents = match load_pack_dir(Path::new(dir)) {
        Ok(c) => c,
        Err(e) => {
            output::eprintln_line(&format!("pack-verify: {e:#}"));
            return Ok(2);
        }
    };

    let opts = PackVerifyOptions {
        deep: !no_deep,
        check_refs: !no_refs,
        ..Default::default()
    };
    let result = verify_pack(&contents, &opts);
    output::print_canonical(&result)?;
    Ok(if result.ok { 0 } else { 1 })
}
