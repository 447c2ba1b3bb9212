use tessera_core::Config;
use tracing::warn;

use crate::mode::RunMode;

/// Flags a caller may pass through to `go test`.
pub const ALLOWED_TEST_FLAGS: &[&str] = &[
    "-json",
    "-v",
    "-count",
    "-cpu",
    "-parallel",
    "-shuffle",
    "-failfast",
    "-vet",
    "-run",
    "-bench",
    "-benchmem",
    "-benchtime",
    "-short",
    "-timeout",
    "-race",
    "-cover",
    "-covermode",
    "-coverpkg",
    "-tags",
];

/// Allowed flags whose value may follow as a separate argument.
const FLAGS_WITH_VALUES: &[&str] = &[
    "-count",
    "-cpu",
    "-parallel",
    "-vet",
    "-run",
    "-bench",
    "-benchtime",
    "-timeout",
    "-covermode",
    "-coverpkg",
    "-tags",
];

const TIMEOUT_FLAG: &str = "-timeout";
const SHORT_FLAG: &str = "-short";

/// Package pattern every invocation ends with.
pub const ALL_PACKAGES: &str = "./...";

/// Checks caller supplied test arguments against [`ALLOWED_TEST_FLAGS`].
///
/// Non-flag arguments such as package paths pass unchanged.
///
/// # Errors
/// Returns the first disallowed flag name.
pub fn sanitize_extra_args(args: &[String]) -> Result<Vec<String>, String> {
    let mut safe = Vec::with_capacity(args.len());
    let mut index = 0;
    while index < args.len() {
        let arg = &args[index];
        if let Some((flag, _)) = arg.split_once('=') {
            if !ALLOWED_TEST_FLAGS.contains(&flag) {
                return Err(flag.to_owned());
            }
            safe.push(arg.clone());
        } else if ALLOWED_TEST_FLAGS.contains(&arg.as_str()) {
            safe.push(arg.clone());
            if FLAGS_WITH_VALUES.contains(&arg.as_str())
                && let Some(value) = args.get(index + 1).filter(|next| !next.starts_with('-'))
            {
                safe.push(value.clone());
                index += 1;
            }
        } else if arg.starts_with('-') {
            return Err(arg.clone());
        } else {
            safe.push(arg.clone());
        }
        index += 1;
    }
    Ok(safe)
}

/// Whether `args` already sets `flag`, either bare or as `flag=value`.
pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|arg| {
        arg == flag
            || arg
                .strip_prefix(flag)
                .is_some_and(|rest| rest.starts_with('='))
    })
}

fn remove_timeout_flag(args: Vec<String>) -> Vec<String> {
    let mut kept = Vec::with_capacity(args.len());
    let mut iter = args.into_iter().peekable();
    while let Some(arg) = iter.next() {
        if arg == TIMEOUT_FLAG {
            if iter.peek().is_some_and(|next| !next.starts_with('-')) {
                iter.next();
            }
        } else if !arg.starts_with("-timeout=") {
            kept.push(arg);
        }
    }
    kept
}

/// Full `go test` argument list for one module run.
///
/// `tag` replaces the configured test tags for tagged sweeps; build tags from
/// configuration are always included. `cover_profile` is the profile file name
/// for coverage modes.
pub fn build_test_args(
    config: &Config,
    mode: RunMode,
    tag: Option<&str>,
    extra: &[String],
    cover_profile: Option<&str>,
) -> Vec<String> {
    let test = &config.test;
    let mut args = vec!["test".to_owned()];

    if test.parallel > 0 {
        args.push("-p".to_owned());
        args.push(test.parallel.to_string());
    }
    if test.verbose {
        args.push("-v".to_owned());
    }
    if let Some(timeout) = test.timeout.as_deref().filter(|timeout| !timeout.is_empty()) {
        args.push(TIMEOUT_FLAG.to_owned());
        args.push(timeout.to_owned());
    }

    let tags = run_tags(config, tag);
    if !tags.is_empty() {
        args.push("-tags".to_owned());
        args.push(tags.join(","));
    }
    if mode.race() || test.race {
        args.push("-race".to_owned());
    }
    if mode.coverage() || test.cover {
        args.push("-cover".to_owned());
    }
    if test.shuffle {
        args.push("-shuffle=on".to_owned());
    }

    if !extra.is_empty() {
        match sanitize_extra_args(extra) {
            Ok(safe) => {
                if has_flag(&safe, TIMEOUT_FLAG) {
                    args = remove_timeout_flag(args);
                }
                args.extend(safe);
            }
            Err(flag) => warn!("Flag {flag} is not allowed; ignoring extra test arguments"),
        }
    }

    if (mode.short() || test.short) && !has_flag(&args, SHORT_FLAG) {
        args.push(SHORT_FLAG.to_owned());
    }

    if mode.coverage()
        && let Some(profile) = cover_profile
    {
        args.push(format!("-coverprofile={profile}"));
        let cover_mode = if mode.race() || test.race {
            "atomic"
        } else {
            test.cover_mode.as_str()
        };
        args.push(format!("-covermode={cover_mode}"));
        if !test.cover_pkg.is_empty() {
            args.push(format!("-coverpkg={}", test.cover_pkg.join(",")));
        }
    }

    args.push(ALL_PACKAGES.to_owned());
    args
}

/// Tags for one run: build tags, then either the sweep tag or the configured test tags.
pub fn run_tags(config: &Config, tag: Option<&str>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let sweep: Vec<String> = match tag {
        Some(name) => vec![name.to_owned()],
        None => config.test.tags.clone(),
    };
    for candidate in config.build.tags.iter().chain(&sweep) {
        if !tags.contains(candidate) {
            tags.push(candidate.clone());
        }
    }
    tags
}
