/// Converts a percentage (0–100) into a letter grade.
///
/// | Range   | Grade |
/// |---------|-------|
/// | >= 95   | A+    |
/// | >= 90   | A     |
/// | >= 85   | B+    |
/// | >= 80   | B     |
/// | >= 75   | C+    |
/// | >= 70   | C     |
/// | >= 60   | D     |
/// | < 60    | F     |
pub fn grade(p: f64) -> String {
    match p {
        p if p >= 95.0 => "A+".into(),
        p if p >= 90.0 => "A".into(),
        p if p >= 85.0 => "B+".into(),
        p if p >= 80.0 => "B".into(),
        p if p >= 75.0 => "C+".into(),
        p if p >= 70.0 => "C".into(),
        p if p >= 60.0 => "D".into(),
        _ => "F".into(),
    }
}
