/// Indents all lines of a string with `n` spaces.
pub fn indent<T: Into<String>>(s: T, n: usize) -> String {
    let s: String = s.into();
    let indent = " ".repeat(n);
    s.lines()
        .map(|l| format!("{}{}", indent, l))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Formats a float the way QEL displays numbers: no trailing zeros, no
/// trailing dot.
pub fn display_float(f: f64) -> String {
    if f.is_finite() && f == f.trunc() && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}
