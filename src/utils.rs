const BIG_SUFFIXES: [(f64, &str); 6] = [
    (1e18, "E"),
    (1e15, "P"),
    (1e12, "T"),
    (1e9, "G"),
    (1e6, "M"),
    (1e3, "K"),
];
const SMALL_SUFFIXES: [(f64, &str); 3] = [(1e-3, "m"), (1e-6, "u"), (1e-9, "n")];
const BYTE_UNITS: [&str; 6] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Six significant digits with trailing zeros removed.
fn sig6(num: f64) -> String {
    if num == 0.0 || !num.is_finite() {
        return format!("{num}");
    }
    #[allow(clippy::cast_possible_truncation)]
    let magnitude = num.abs().log10().floor() as i32;
    let precision = usize::try_from(5 - magnitude).unwrap_or(0);
    let s = format!("{num:.precision$}");
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_owned()
    } else {
        s
    }
}

/// Human-readable number with an SI suffix, e.g. `1.25M` or `3.5m`.
#[must_use]
pub fn num_str(num: f64) -> String {
    let mag = num.abs();
    if mag == 0.0 || !num.is_finite() || (1.0..1e3).contains(&mag) {
        return sig6(num);
    }
    let pick = if mag >= 1e3 {
        BIG_SUFFIXES.iter().find(|(scale, _)| mag >= *scale)
    } else {
        SMALL_SUFFIXES.iter().find(|(scale, _)| mag >= *scale)
    };
    match pick {
        Some(&(scale, suffix)) => format!("{}{suffix}", sig6(num / scale)),
        None => sig6(num),
    }
}

/// Integer variant of [`num_str`].
#[must_use]
pub fn count_str(n: i64) -> String {
    num_str(n as f64)
}

/// Human-readable byte count with a binary suffix, e.g. `1.5MiB`.
#[must_use]
pub fn byte_str(nbytes: usize) -> String {
    let mut value = nbytes as f64;
    if value < 1024.0 {
        return format!("{nbytes}B");
    }
    let mut unit = BYTE_UNITS[0];
    for next in BYTE_UNITS {
        value /= 1024.0;
        unit = next;
        if value < 1024.0 {
            break;
        }
    }
    format!("{}{unit}", sig6(value))
}

/// ` (12.5%)` share of `part` in `whole`, or nothing when `whole` is not
/// positive.
#[must_use]
pub fn pct_str(part: f64, whole: f64) -> String {
    if whole > 0.0 {
        format!(" ({}%)", sig6(100.0 * part / whole))
    } else {
        String::new()
    }
}
