//! Fisher's exact test.
//!
//! For a 2×2 table `[[a, b], [c, d]]` with fixed margins, the count `a`
//! follows a hypergeometric distribution. The p-value is the probability of
//! tables at least as extreme as the observed one:
//!
//! - `Less`: P(X ≤ a)
//! - `Greater`: P(X ≥ a)
//! - `TwoSided`: sum of P(X = k) over every k with P(X = k) ≤ P(X = a)
//!
//! Probabilities are computed in log space, so registry-sized counts neither
//! overflow nor lose the tail to underflow before summation.

use serde::{Deserialize, Serialize};

use super::contingency::ContingencyTable;
use crate::error::{CaremarketError, Result};

/// Relative tolerance when comparing table probabilities for "as extreme".
const RELATIVE_TOLERANCE: f64 = 1e-7;

/// Alternative hypothesis direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tail {
    #[default]
    TwoSided,
    /// Odds ratio greater than one.
    Greater,
    /// Odds ratio less than one.
    Less,
}

/// Outcome of an exact test on a 2×2 table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExactTestResult {
    /// Sample odds ratio `(a·d)/(b·c)`; see [`odds_ratio`] for zero cells.
    pub odds_ratio: f64,
    pub p_value: f64,
    pub tail: Tail,
}

impl ExactTestResult {
    /// Whether the null hypothesis is rejected at `alpha`.
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Cumulative `ln(k!)` for `k` up to a fixed bound.
struct LogFactorial {
    table: Vec<f64>,
}

impl LogFactorial {
    fn up_to(n: u64) -> Self {
        let mut table = Vec::with_capacity(n as usize + 1);
        table.push(0.0);
        let mut acc = 0.0;
        for k in 1..=n {
            acc += (k as f64).ln();
            table.push(acc);
        }
        Self { table }
    }

    fn get(&self, k: u64) -> f64 {
        self.table[k as usize]
    }

    fn ln_choose(&self, n: u64, k: u64) -> f64 {
        self.get(n) - self.get(k) - self.get(n - k)
    }
}

/// Hypergeometric law of the top-left cell given the margins.
struct Hypergeometric {
    log_factorial: LogFactorial,
    /// First row sum.
    n1: u64,
    /// Second row sum.
    n2: u64,
    /// First column sum.
    n: u64,
}

impl Hypergeometric {
    fn new(n1: u64, n2: u64, n: u64) -> Self {
        Self {
            log_factorial: LogFactorial::up_to(n1 + n2),
            n1,
            n2,
            n,
        }
    }

    /// Smallest and largest possible value of the top-left cell.
    fn support(&self) -> (u64, u64) {
        (self.n.saturating_sub(self.n2), self.n.min(self.n1))
    }

    fn ln_pmf(&self, k: u64) -> f64 {
        let lf = &self.log_factorial;
        lf.ln_choose(self.n1, k) + lf.ln_choose(self.n2, self.n - k)
            - lf.ln_choose(self.n1 + self.n2, self.n)
    }

    fn pmf(&self, k: u64) -> f64 {
        self.ln_pmf(k).exp()
    }
}

/// Run Fisher's exact test on a 2×2 table.
///
/// A table with a zero row or column sum has only one possible arrangement,
/// so its p-value is exactly 1. An empty table is rejected.
pub fn exact_test(table: &ContingencyTable, tail: Tail) -> Result<ExactTestResult> {
    if table.shape() != (2, 2) {
        let (r, c) = table.shape();
        return Err(CaremarketError::InvalidArgument(format!(
            "exact_test needs a 2x2 table, got {}x{}; use exact_test_rxc",
            r, c
        )));
    }
    if table.total() == 0 {
        return Err(CaremarketError::DegenerateTable(
            "table has no observations".to_string(),
        ));
    }

    let [a, b, c, d] = [
        table.counts[0][0],
        table.counts[0][1],
        table.counts[1][0],
        table.counts[1][1],
    ];
    let odds_ratio = odds_ratio(a, b, c, d);

    if table.has_zero_margin() {
        return Ok(ExactTestResult {
            odds_ratio,
            p_value: 1.0,
            tail,
        });
    }

    let dist = Hypergeometric::new(a + b, c + d, a + c);
    let (lo, hi) = dist.support();

    let p_value = match tail {
        Tail::Less => (lo..=a).map(|k| dist.pmf(k)).sum::<f64>(),
        Tail::Greater => (a..=hi).map(|k| dist.pmf(k)).sum::<f64>(),
        Tail::TwoSided => {
            let threshold = dist.ln_pmf(a) + RELATIVE_TOLERANCE.ln_1p();
            (lo..=hi)
                .map(|k| dist.ln_pmf(k))
                .filter(|&lp| lp <= threshold)
                .map(f64::exp)
                .sum::<f64>()
        }
    };

    Ok(ExactTestResult {
        odds_ratio,
        p_value: p_value.min(1.0),
        tail,
    })
}

/// Sample odds ratio `(a·d)/(b·c)`.
///
/// When `b·c = 0` but `a·d > 0` the ratio is `+∞`. When both products are
/// zero the Haldane–Anscombe correction (add ½ to every cell) gives a finite
/// value.
pub fn odds_ratio(a: u64, b: u64, c: u64, d: u64) -> f64 {
    let ad = a as f64 * d as f64;
    let bc = b as f64 * c as f64;
    if bc > 0.0 {
        ad / bc
    } else if ad > 0.0 {
        f64::INFINITY
    } else {
        ((a as f64 + 0.5) * (d as f64 + 0.5)) / ((b as f64 + 0.5) * (c as f64 + 0.5))
    }
}

/// Freeman–Halton extension of the exact test to any R×C table (two-sided).
///
/// Enumerates every table with the observed margins and sums the
/// probabilities of those no more likely than the observed one. Fails when
/// more than `limit` tables would have to be visited.
pub fn exact_test_rxc(table: &ContingencyTable, limit: usize) -> Result<f64> {
    let total = table.total();
    if total == 0 {
        return Err(CaremarketError::DegenerateTable(
            "table has no observations".to_string(),
        ));
    }

    let row_sums = table.row_sums();
    let col_sums = table.col_sums();
    let log_factorial = LogFactorial::up_to(total);

    let constant = row_sums.iter().map(|&r| log_factorial.get(r)).sum::<f64>()
        + col_sums.iter().map(|&c| log_factorial.get(c)).sum::<f64>()
        - log_factorial.get(total);
    let observed = constant
        - table
            .counts
            .iter()
            .flatten()
            .map(|&x| log_factorial.get(x))
            .sum::<f64>();

    let mut walk = TableWalk {
        log_factorial: &log_factorial,
        rows_left: row_sums,
        col_sums,
        constant,
        threshold: observed + RELATIVE_TOLERANCE.ln_1p(),
        p_value: 0.0,
        visited: 0,
        limit,
    };
    walk.column(0, 0.0)?;

    Ok(walk.p_value.min(1.0))
}

/// Depth-first enumeration of tables with fixed margins, filled column by column.
struct TableWalk<'a> {
    log_factorial: &'a LogFactorial,
    rows_left: Vec<u64>,
    col_sums: Vec<u64>,
    constant: f64,
    threshold: f64,
    p_value: f64,
    visited: usize,
    limit: usize,
}

impl TableWalk<'_> {
    /// `acc` holds `-Σ ln(x!)` over the cells fixed so far.
    fn column(&mut self, j: usize, acc: f64) -> Result<()> {
        if j + 1 == self.col_sums.len() {
            // The last column is forced by what is left of each row.
            self.visited += 1;
            if self.visited > self.limit {
                return Err(CaremarketError::InvalidArgument(format!(
                    "exact R x C test would enumerate more than {} tables",
                    self.limit
                )));
            }
            let rest: f64 = self
                .rows_left
                .iter()
                .map(|&x| self.log_factorial.get(x))
                .sum();
            let ln_p = self.constant + acc - rest;
            if ln_p <= self.threshold {
                self.p_value += ln_p.exp();
            }
            return Ok(());
        }
        self.cell(j, 0, self.col_sums[j], acc)
    }

    fn cell(&mut self, j: usize, i: usize, remaining: u64, acc: f64) -> Result<()> {
        if i + 1 == self.rows_left.len() {
            let x = remaining;
            if x > self.rows_left[i] {
                return Ok(());
            }
            self.rows_left[i] -= x;
            let result = self.column(j + 1, acc - self.log_factorial.get(x));
            self.rows_left[i] += x;
            return result;
        }

        let below: u64 = self.rows_left[i + 1..].iter().sum();
        let lo = remaining.saturating_sub(below);
        let hi = self.rows_left[i].min(remaining);
        for x in lo..=hi {
            self.rows_left[i] -= x;
            let result = self.cell(j, i + 1, remaining - x, acc - self.log_factorial.get(x));
            self.rows_left[i] += x;
            result?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_reference_table_3_1_1_3() {
        let table = ContingencyTable::two_by_two([[3, 1], [1, 3]]);
        let two = exact_test(&table, Tail::TwoSided).unwrap();
        assert!(close(two.p_value, 34.0 / 70.0), "p = {}", two.p_value);
        assert!(close(two.odds_ratio, 9.0));

        let greater = exact_test(&table, Tail::Greater).unwrap();
        assert!(close(greater.p_value, 17.0 / 70.0));
        let less = exact_test(&table, Tail::Less).unwrap();
        assert!(close(less.p_value, 69.0 / 70.0));
    }

    #[test]
    fn test_reference_table_6_2_1_4() {
        let table = ContingencyTable::two_by_two([[6, 2], [1, 4]]);
        let two = exact_test(&table, Tail::TwoSided).unwrap();
        assert!(close(two.p_value, 176.0 / 1716.0));
        assert!(close(two.odds_ratio, 12.0));
        let greater = exact_test(&table, Tail::Greater).unwrap();
        assert!(close(greater.p_value, 148.0 / 1716.0));
        let less = exact_test(&table, Tail::Less).unwrap();
        assert!(close(less.p_value, 1708.0 / 1716.0));
    }

    #[test]
    fn test_zero_margin_gives_p_one() {
        let table = ContingencyTable::two_by_two([[0, 0], [4, 5]]);
        for tail in [Tail::TwoSided, Tail::Greater, Tail::Less] {
            let result = exact_test(&table, tail).unwrap();
            assert_eq!(result.p_value, 1.0);
            assert!(result.odds_ratio.is_finite());
        }
    }

    #[test]
    fn test_odds_ratio_conventions() {
        assert_eq!(odds_ratio(5, 0, 2, 3), f64::INFINITY);
        assert_eq!(odds_ratio(0, 3, 2, 4), 0.0);
        // Haldane-Anscombe: (0.5 * 4.5) / (3.5 * 0.5)
        assert!(close(odds_ratio(0, 3, 0, 4), (0.5 * 4.5) / (3.5 * 0.5)));
    }

    #[test]
    fn test_empty_table_is_degenerate() {
        let table = ContingencyTable::two_by_two([[0, 0], [0, 0]]);
        assert!(matches!(
            exact_test(&table, Tail::TwoSided),
            Err(CaremarketError::DegenerateTable(_))
        ));
    }

    #[test]
    fn test_non_2x2_rejected() {
        let table =
            ContingencyTable::from_counts(&["a", "b"], &["x", "y", "z"], vec![vec![1, 2, 3], vec![3, 2, 1]])
                .unwrap();
        assert!(matches!(
            exact_test(&table, Tail::TwoSided),
            Err(CaremarketError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_large_counts_stay_finite() {
        let table = ContingencyTable::two_by_two([[120_000, 80_000], [95_000, 105_000]]);
        let result = exact_test(&table, Tail::TwoSided).unwrap();
        assert!(result.p_value >= 0.0 && result.p_value < 1e-10);
    }

    #[test]
    fn test_rxc_agrees_with_2x2() {
        let table = ContingencyTable::two_by_two([[3, 1], [1, 3]]);
        let p = exact_test_rxc(&table, 1_000).unwrap();
        assert!(close(p, 34.0 / 70.0));

        let table = ContingencyTable::two_by_two([[6, 2], [1, 4]]);
        let p = exact_test_rxc(&table, 1_000).unwrap();
        assert!(close(p, 176.0 / 1716.0));
    }

    #[test]
    fn test_rxc_3x2_and_limit() {
        // rows (2, 2, 2), columns (3, 3): six tables of probability 0.1 and
        // one of 0.4; the observed table is one of the six.
        let table = ContingencyTable::from_counts(
            &["a", "b", "c"],
            &["x", "y"],
            vec![vec![2, 0], vec![1, 1], vec![0, 2]],
        )
        .unwrap();
        let p = exact_test_rxc(&table, 1_000).unwrap();
        assert!(close(p, 0.6), "p = {}", p);

        assert!(matches!(
            exact_test_rxc(&table, 2),
            Err(CaremarketError::InvalidArgument(_))
        ));
    }
}
