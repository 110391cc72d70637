//! Regression design for the additive trend + seasonality model
//!
//! Column layout of a design row:
//!
//! | index            | term                                  |
//! |------------------|---------------------------------------|
//! | 0                | intercept                             |
//! | 1                | base slope                            |
//! | 2 .. 2+C         | hinge `max(t - c_j, 0)` per changepoint |
//! | 2+C ..           | `sin`/`cos` pairs per seasonality      |
//!
//! `t` is time scaled to [0, 1] over the history; seasonal terms use the
//! absolute day number so the weekly phase does not depend on where the
//! series starts.

use std::f64::consts::PI;

use serde::Serialize;

/// Periodic component a Fourier block models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalComponent {
    Weekly,
    Yearly,
}

impl SeasonalComponent {
    pub fn period_days(&self) -> f64 {
        match self {
            Self::Weekly => 7.0,
            Self::Yearly => 365.25,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Yearly => "yearly",
        }
    }
}

/// A Fourier block: `order` sin/cos pairs of one period
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Seasonality {
    pub component: SeasonalComponent,
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Design {
    pub changepoints: Vec<f64>,
    pub seasonalities: Vec<Seasonality>,
}

/// Contribution of each model part at one time point, in scaled units
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Decomposition {
    pub trend: f64,
    pub weekly: f64,
    pub yearly: f64,
}

impl Decomposition {
    pub fn total(&self) -> f64 {
        self.trend + self.weekly + self.yearly
    }
}

impl Design {
    pub fn n_columns(&self) -> usize {
        2 + self.changepoints.len() + self.seasonalities.iter().map(|s| 2 * s.order).sum::<usize>()
    }

    /// Index of the first seasonal column
    fn seasonal_offset(&self) -> usize {
        2 + self.changepoints.len()
    }

    pub fn row(&self, t: f64, day: f64) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.n_columns());
        row.push(1.0);
        row.push(t);
        for &c in &self.changepoints {
            row.push((t - c).max(0.0));
        }
        for s in &self.seasonalities {
            push_fourier(&mut row, day, s.component.period_days(), s.order);
        }
        row
    }

    /// Ridge penalty per column; intercept and base slope are unpenalized
    pub fn penalties(&self, changepoint_penalty: f64, seasonality_penalty: f64) -> Vec<f64> {
        let mut penalties = vec![0.0, 0.0];
        penalties.extend(std::iter::repeat(changepoint_penalty).take(self.changepoints.len()));
        penalties.extend(
            std::iter::repeat(seasonality_penalty).take(self.n_columns() - self.seasonal_offset()),
        );
        penalties
    }

    /// Split `beta · row(t, day)` into trend and seasonal parts
    pub fn decompose(&self, beta: &[f64], t: f64, day: f64) -> Decomposition {
        let row = self.row(t, day);
        let dot = |range: std::ops::Range<usize>| -> f64 {
            range.map(|i| beta[i] * row[i]).sum()
        };

        let mut parts = Decomposition {
            trend: dot(0..self.seasonal_offset()),
            ..Decomposition::default()
        };

        let mut offset = self.seasonal_offset();
        for s in &self.seasonalities {
            let width = 2 * s.order;
            let value = dot(offset..offset + width);
            match s.component {
                SeasonalComponent::Weekly => parts.weekly += value,
                SeasonalComponent::Yearly => parts.yearly += value,
            }
            offset += width;
        }

        parts
    }
}

fn push_fourier(row: &mut Vec<f64>, day: f64, period: f64, order: usize) {
    for k in 1..=order {
        let x = 2.0 * PI * k as f64 * day / period;
        row.push(x.sin());
        row.push(x.cos());
    }
}

/// Place changepoints uniformly over the first `range` of the history
///
/// `t` must be sorted. Short histories get fewer changepoints: at most
/// `floor(n · range) - 1`.
pub(crate) fn place_changepoints(t: &[f64], n_changepoints: usize, range: f64) -> Vec<f64> {
    let hist_size = (t.len() as f64 * range).floor() as usize;
    let count = n_changepoints.min(hist_size.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }

    let last = (hist_size - 1) as f64;
    let mut changepoints: Vec<f64> = (1..=count)
        .map(|i| {
            let idx = (last * i as f64 / count as f64).round() as usize;
            t[idx.min(t.len() - 1)]
        })
        .collect();
    changepoints.dedup();
    changepoints
}
