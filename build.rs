use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
  println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

  let epoch_secs = std::env::var("SOURCE_DATE_EPOCH")
    .ok()
    .and_then(|v| v.parse::<i64>().ok())
    .unwrap_or_else(|| {
      SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
    });

  let (y, m, d) = civil_from_days(epoch_secs.div_euclid(86_400));
  println!("cargo:rustc-env=THREAD_ORCHESTRA_BUILD_DATE={y:04}-{m:02}-{d:02}");
}

/// Days-since-epoch to civil date (Howard Hinnant's `civil_from_days`).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
  let z = z + 719_468;
  let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
  let doe = (z - era * 146_097) as u64;
  let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
  let y = yoe as i64 + era * 400;
  let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
  let mp = (5 * doy + 2) / 153;
  let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
  let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
  (if m <= 2 { y + 1 } else { y }, m, d)
}
