use std::env;
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use bindgen::callbacks::{IntKind, ParseCallbacks};
use bindgen::{CargoCallbacks, RustTarget};
use itertools::Itertools;

/// Extra include dir holding `linux/perf_event.h`, for hosts without uapi headers.
const HEADERS_ENV: &str = "PERF_EVENT_RING_HEADERS";

// Each becomes `PERF_IOC_OP_<op> = PERF_EVENT_IOC_<op>`, so clang expands the
// `_IO*` macros with the target's own direction bits and size field width.
#[rustfmt::skip]
const IOC_OPS: [&str; 12] = [
    "ENABLE",     "DISABLE",    "REFRESH", "RESET",
    "PERIOD",     "SET_OUTPUT", "SET_FILTER", "ID",
    "SET_BPF",    "PAUSE_OUTPUT", "QUERY_BPF", "MODIFY_ATTRIBUTES",
];

/// Gives header macros the width of the field they are tested against.
#[derive(Debug)]
struct MacroWidth;

impl ParseCallbacks for MacroWidth {
    fn int_macro(&self, name: &str, _value: i64) -> Option<IntKind> {
        if name.starts_with("PERF_RECORD_MISC_") {
            Some(IntKind::U16)
        } else if name.starts_with("PERF_FLAG_") || name.starts_with("PERF_AUX_FLAG_") {
            Some(IntKind::U64)
        } else {
            None
        }
    }
}

fn main() -> Result<()> {
    let os = env::var("CARGO_CFG_TARGET_OS").context("target os not set")?;
    ensure!(
        os == "linux" || os == "android",
        "`perf_event_open` syscall can only be used in linux or android target, not {os}"
    );
    println!("cargo:rerun-if-changed=build");
    println!("cargo:rerun-if-env-changed={HEADERS_ENV}");

    let ops = IOC_OPS
        .iter()
        .map(|op| format!("PERF_IOC_OP_{op} = PERF_EVENT_IOC_{op},"))
        .join("\n");
    // Values newer than the host headers are filled in, running kernels that
    // lack them reject them at open.
    let contents = format!(
        "
        #include <linux/version.h>
        #include <linux/perf_event.h>
        #include <linux/hw_breakpoint.h>

        #ifndef PERF_ATTR_SIZE_VER8
        #define PERF_ATTR_SIZE_VER8 136
        #endif

        #if LINUX_VERSION_CODE < KERNEL_VERSION(6, 8, 0)
        enum {{ PERF_SAMPLE_BRANCH_COUNTERS = 1U << 19 }};
        #endif

        enum perf_ioc_ops {{
            {ops}
        }};
        "
    );

    let mut builder = bindgen::Builder::default()
        .rust_target(env!("CARGO_PKG_RUST_VERSION").parse::<RustTarget>()?)
        .derive_default(true)
        .generate_comments(false)
        .prepend_enum_name(false)
        .translate_enum_integer_types(true)
        .header_contents("wrapper.h", &contents)
        .parse_callbacks(Box::new(MacroWidth))
        .parse_callbacks(Box::new(CargoCallbacks::new()))
        .allowlist_file(r#".*wrapper\.h.*"#)
        .allowlist_file(r#".*perf_event\.h.*"#)
        .allowlist_item("HW_BREAKPOINT_.*");
    if let Ok(dir) = env::var(HEADERS_ENV) {
        builder = builder.clang_arg(format!("-I{dir}"));
    }

    let out = PathBuf::from(env::var("OUT_DIR").context("OUT_DIR not set")?).join("bindings.rs");
    builder
        .generate()
        .context("failed to generate bindings")?
        .write_to_file(&out)
        .with_context(|| format!("failed to write bindings to: {:?}", out))?;

    Ok(())
}
