use std::collections::BTreeMap;
use std::io::{self, Write};

use chrono::{Datelike, NaiveDate};

/// Per-month counters, one column per header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyCounts {
    headers: Vec<String>,
    years: BTreeMap<i32, BTreeMap<u32, Vec<u64>>>,
}

impl MonthlyCounts {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            years: BTreeMap::new(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn increment(&mut self, year: i32, month: u32, column: usize) {
        let width = self.headers.len();
        let row = self
            .years
            .entry(year)
            .or_default()
            .entry(month)
            .or_insert_with(|| vec![0; width]);
        if let Some(cell) = row.get_mut(column) {
            *cell += 1;
        }
    }

    pub fn get(&self, year: i32, month: u32) -> Option<&[u64]> {
        self.years
            .get(&year)
            .and_then(|months| months.get(&month))
            .map(Vec::as_slice)
    }

    /// Writes `Month-Year,<headers>` followed by one zero-filled row per
    /// month of every year seen, stopping before the month of `today`.
    pub fn write_csv<W: Write>(&self, out: &mut W, today: NaiveDate) -> io::Result<()> {
        writeln!(out, "Month-Year,{}", self.headers.join(","))?;
        let zeros = vec![0u64; self.headers.len()];
        let cutoff = (today.year(), today.month());

        for (&year, months) in &self.years {
            for month in 1..=12u32 {
                if (year, month) >= cutoff {
                    continue;
                }
                let row = months.get(&month).unwrap_or(&zeros);
                let cells = row.iter().map(u64::to_string).collect::<Vec<_>>();
                writeln!(out, "{month}-{year},{}", cells.join(","))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_fills_and_stops_at_current_month() {
        let mut counts = MonthlyCounts::new(["# Jobs", "# Failed"]);
        counts.increment(2024, 2, 0);
        counts.increment(2024, 2, 0);
        counts.increment(2024, 3, 1);

        let today = NaiveDate::from_ymd_opt(2024, 4, 15).unwrap();
        let mut buffer = Vec::new();
        counts.write_csv(&mut buffer, today).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert_eq!(
            text,
            "Month-Year,# Jobs,# Failed\n1-2024,0,0\n2-2024,2,0\n3-2024,0,1\n"
        );
    }

    #[test]
    fn past_years_print_all_months() {
        let mut counts = MonthlyCounts::new(["# Jobs"]);
        counts.increment(2022, 12, 0);
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut buffer = Vec::new();
        counts.write_csv(&mut buffer, today).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 13);
        assert!(text.ends_with("12-2022,1\n"));
    }
}
