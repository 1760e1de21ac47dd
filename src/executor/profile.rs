//! Per-opcode execution counts and wall time for a run.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use prettytable::Table;
use strum::IntoEnumIterator;

use crate::bytecode::Opcode;
use crate::display::TABLE_DISPLAY_FORMAT;

#[derive(Clone, Debug)]
pub struct Profile {
  counts  : [u64; 256],
  total   : u64,
  elapsed : Duration,
}

impl Default for Profile {
  fn default() -> Self {
    Profile {
      counts  : [0; 256],
      total   : 0,
      elapsed : Duration::default()
    }
  }
}

impl Profile {
  pub fn new() -> Profile {
    Profile::default()
  }

  pub fn record(&mut self, opcode: Opcode) {
    self.counts[opcode.code() as usize] += 1;
    self.total += 1;
  }

  pub fn set_elapsed(&mut self, elapsed: Duration) {
    self.elapsed = elapsed;
  }

  pub fn count(&self, opcode: Opcode) -> u64 {
    self.counts[opcode.code() as usize]
  }

  /// Instructions executed.
  pub fn total(&self) -> u64 {
    self.total
  }

  pub fn elapsed(&self) -> Duration {
    self.elapsed
  }
}

impl Display for Profile {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let mut executed: Vec<(Opcode, u64)> = Opcode::iter()
                                                  .map(|opcode| (opcode, self.count(opcode)))
                                                  .filter(|(_, count)| *count > 0)
                                                  .collect();
    // Most frequent first, ties in opcode order.
    executed.sort_by(|(a, a_count), (b, b_count)| b_count.cmp(a_count).then(a.code().cmp(&b.code())));

    let mut table = Table::new();
    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubl->"Opcode", ubr->"Count", ubr->"Share"]);

    for (opcode, count) in executed {
      let share = 100.0 * count as f64 / self.total as f64;
      table.add_row(row![opcode, r->count, r->format!("{:.1}%", share)]);
    }

    writeln!(f, "{} instructions in {:?}", self.total, self.elapsed)?;
    write!(f, "{}", table)
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counts_and_report() {
    let mut profile = Profile::new();
    for _ in 0..3 {
      profile.record(Opcode::IInc);
    }
    profile.record(Opcode::Halt);

    assert_eq!(profile.total(), 4);
    assert_eq!(profile.count(Opcode::IInc), 3);
    assert_eq!(profile.count(Opcode::Nop), 0);

    let report = profile.to_string();
    assert!(report.starts_with("4 instructions"));
    assert!(report.contains("iinc"));
    assert!(report.contains("75.0%"));
    assert!(!report.contains("nop"));
    assert!(report.find("iinc") < report.find("halt"));
  }
}
