//! Storage for MCCFR regrets and strategy sums.
//!
//! [`RegretTracker`] owns one row per information set. Each row holds the
//! cumulative regret and cumulative strategy weight of every action seen
//! there, plus the discount generation it was last brought up to date with.
//!
//! Discounting is lazy: [`RegretTracker::discount`] only appends the factors
//! to a per-generation log-scale history. Reads apply whatever is pending for
//! the row without mutating it; writes first catch the row up, then add.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::abstraction::{AbstractAction, KeyError, KeyFormat};

/// Errors raised by tracker operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    /// Discount factors must be finite and positive.
    #[error("discount factor {0} must be finite and > 0")]
    InvalidDiscount(f64),
    /// A stored key is malformed or the table mixes key formats.
    #[error(transparent)]
    Key(#[from] KeyError),
    /// Stored state is internally inconsistent.
    #[error("corrupt tracker state: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone)]
struct Row {
    actions: Vec<AbstractAction>,
    regrets: Vec<f64>,
    strategy_sums: Vec<f64>,
    generation: usize,
}

impl Row {
    fn new() -> Self {
        Self {
            actions: Vec::new(),
            regrets: Vec::new(),
            strategy_sums: Vec::new(),
            generation: 0,
        }
    }

    fn slot(&mut self, action: AbstractAction) -> usize {
        match self.actions.iter().position(|&a| a == action) {
            Some(i) => i,
            None => {
                self.actions.push(action);
                self.regrets.push(0.0);
                self.strategy_sums.push(0.0);
                self.actions.len() - 1
            }
        }
    }

    fn index(&self, action: AbstractAction) -> Option<usize> {
        self.actions.iter().position(|&a| a == action)
    }
}

/// Pending multipliers for a row last touched at `from`.
fn pending(from: usize, log_regret: &[f64], log_strategy: &[f64]) -> (f64, f64) {
    let now = log_regret.len() - 1;
    if from >= now {
        return (1.0, 1.0);
    }
    (
        (log_regret[now] - log_regret[from]).exp(),
        (log_strategy[now] - log_strategy[from]).exp(),
    )
}

fn catch_up(row: &mut Row, log_regret: &[f64], log_strategy: &[f64]) {
    let now = log_regret.len() - 1;
    if row.generation == now {
        return;
    }
    let (r, s) = pending(row.generation, log_regret, log_strategy);
    row.regrets.iter_mut().for_each(|x| *x *= r);
    row.strategy_sums.iter_mut().for_each(|x| *x *= s);
    row.generation = now;
}

/// Cumulative regret and strategy storage with lazy discounting.
///
/// A tracker has a single owner; writers take `&mut self`. Independent
/// solver instances each own their own tracker.
#[derive(Debug, Clone)]
pub struct RegretTracker {
    rows: FxHashMap<String, Row>,
    /// Cumulative ln regret discount after each generation; index 0 is 0.
    log_regret: Vec<f64>,
    /// Cumulative ln strategy discount after each generation.
    log_strategy: Vec<f64>,
}

impl Default for RegretTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RegretTracker {
    /// Create new empty storage.
    pub fn new() -> Self {
        Self {
            rows: FxHashMap::default(),
            log_regret: vec![0.0],
            log_strategy: vec![0.0],
        }
    }

    /// Create storage with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            ..Self::new()
        }
    }

    /// Current discount generation.
    pub fn generation(&self) -> usize {
        self.log_regret.len() - 1
    }

    /// Add `weight * regret` to the cumulative regret of `(key, action)`.
    pub fn update_regret(&mut self, key: &str, action: AbstractAction, regret: f64, weight: f64) {
        let row = self.rows.entry(key.to_string()).or_insert_with(Row::new);
        catch_up(row, &self.log_regret, &self.log_strategy);
        let i = row.slot(action);
        row.regrets[i] += weight * regret;
    }

    /// Add `weight * regrets[i]` for every `actions[i]`.
    pub fn update_regrets(
        &mut self,
        key: &str,
        actions: &[AbstractAction],
        regrets: &[f64],
        weight: f64,
    ) {
        debug_assert_eq!(actions.len(), regrets.len());
        let row = self.rows.entry(key.to_string()).or_insert_with(Row::new);
        catch_up(row, &self.log_regret, &self.log_strategy);
        for (&action, &r) in actions.iter().zip(regrets) {
            let i = row.slot(action);
            row.regrets[i] += weight * r;
        }
    }

    /// Accumulate `weight * strategy[i]` into the strategy sums.
    pub fn add_strategy(
        &mut self,
        key: &str,
        actions: &[AbstractAction],
        strategy: &[f64],
        weight: f64,
    ) {
        debug_assert_eq!(actions.len(), strategy.len());
        let row = self.rows.entry(key.to_string()).or_insert_with(Row::new);
        catch_up(row, &self.log_regret, &self.log_strategy);
        for (&action, &p) in actions.iter().zip(strategy) {
            let i = row.slot(action);
            row.strategy_sums[i] += weight * p;
        }
    }

    /// Discount-adjusted cumulative regret. Zero for unseen pairs.
    pub fn regret(&self, key: &str, action: AbstractAction) -> f64 {
        let Some(row) = self.rows.get(key) else {
            return 0.0;
        };
        let (r, _) = pending(row.generation, &self.log_regret, &self.log_strategy);
        row.index(action).map_or(0.0, |i| row.regrets[i] * r)
    }

    /// Discount-adjusted cumulative strategy weight. Zero for unseen pairs.
    pub fn strategy_sum(&self, key: &str, action: AbstractAction) -> f64 {
        let Some(row) = self.rows.get(key) else {
            return 0.0;
        };
        let (_, s) = pending(row.generation, &self.log_regret, &self.log_strategy);
        row.index(action).map_or(0.0, |i| row.strategy_sums[i] * s)
    }

    /// Current strategy by regret matching.
    ///
    /// Probabilities are proportional to positive regret, uniform when no
    /// regret is positive. Returned in the order of `actions`.
    pub fn get_strategy(&self, key: &str, actions: &[AbstractAction]) -> Vec<f64> {
        let n = actions.len();
        if n == 0 {
            return Vec::new();
        }
        let positive: Vec<f64> = match self.rows.get(key) {
            // A pending discount scales the whole row and cancels out.
            Some(row) => actions
                .iter()
                .map(|&a| row.index(a).map_or(0.0, |i| row.regrets[i].max(0.0)))
                .collect(),
            None => return vec![1.0 / n as f64; n],
        };
        normalize_or_uniform(positive)
    }

    /// Time-averaged strategy, the one published as blueprint.
    ///
    /// Always sums to one for a non-empty action set; unseen or empty rows
    /// fall back to uniform.
    pub fn get_average_strategy(&self, key: &str, actions: &[AbstractAction]) -> Vec<f64> {
        let n = actions.len();
        if n == 0 {
            return Vec::new();
        }
        let sums: Vec<f64> = match self.rows.get(key) {
            Some(row) => actions
                .iter()
                .map(|&a| row.index(a).map_or(0.0, |i| row.strategy_sums[i].max(0.0)))
                .collect(),
            None => return vec![1.0 / n as f64; n],
        };
        normalize_or_uniform(sums)
    }

    /// Record a discount step. O(1); rows catch up on their next write.
    pub fn discount(&mut self, regret_factor: f64, strategy_factor: f64) -> Result<(), TrackerError> {
        for f in [regret_factor, strategy_factor] {
            if !(f.is_finite() && f > 0.0) {
                return Err(TrackerError::InvalidDiscount(f));
            }
        }
        let last_r = self.log_regret[self.log_regret.len() - 1];
        let last_s = self.log_strategy[self.log_strategy.len() - 1];
        self.log_regret.push(last_r + regret_factor.ln());
        self.log_strategy.push(last_s + strategy_factor.ln());
        Ok(())
    }

    /// Apply every pending discount to every row.
    pub fn flush_discounts(&mut self) {
        for row in self.rows.values_mut() {
            catch_up(row, &self.log_regret, &self.log_strategy);
        }
    }

    /// Floor every regret at zero (CFR+), after flushing pending discounts.
    pub fn reset_regrets(&mut self) {
        for row in self.rows.values_mut() {
            catch_up(row, &self.log_regret, &self.log_strategy);
            row.regrets.iter_mut().for_each(|r| *r = r.max(0.0));
        }
    }

    /// Whether every action's regret is strictly below `threshold`.
    ///
    /// A regret exactly at the threshold keeps the node explored.
    pub fn should_prune(&self, key: &str, actions: &[AbstractAction], threshold: f64) -> bool {
        !actions.is_empty() && actions.iter().all(|&a| self.regret(key, a) < threshold)
    }

    /// Actions recorded for an info set, in first-seen order.
    pub fn actions(&self, key: &str) -> Option<&[AbstractAction]> {
        self.rows.get(key).map(|r| r.actions.as_slice())
    }

    /// Get the number of information sets stored.
    pub fn num_info_sets(&self) -> usize {
        self.rows.len()
    }

    /// Check if an info set exists in storage.
    pub fn contains(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.rows.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Clear all stored data, including discount history.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Get total memory usage estimate in bytes.
    pub fn memory_usage(&self) -> usize {
        self.rows
            .iter()
            .map(|(k, row)| {
                k.len()
                    + row.actions.len()
                        * (std::mem::size_of::<AbstractAction>() + 2 * std::mem::size_of::<f64>())
            })
            .sum()
    }

    /// Export the full table, including pending discount bookkeeping.
    pub fn get_state(&self) -> TrackerState {
        let mut rows: Vec<RowState> = self
            .rows
            .iter()
            .map(|(key, row)| RowState {
                key: key.clone(),
                actions: row.actions.clone(),
                regrets: row.regrets.clone(),
                strategy_sums: row.strategy_sums.clone(),
                generation: row.generation,
            })
            .collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        TrackerState {
            rows,
            log_regret_discount: self.log_regret.clone(),
            log_strategy_discount: self.log_strategy.clone(),
            regrets: FxHashMap::default(),
            strategy_sums: FxHashMap::default(),
            action_names: FxHashMap::default(),
        }
    }

    /// Replace the table with `state`.
    ///
    /// Accepts the flat `regrets`/`strategy_sums`/`action_names` layout of
    /// older checkpoints. Missing discount history loads as identity. Every
    /// key must parse and all keys must share one format.
    pub fn set_state(&mut self, state: TrackerState) -> Result<(), TrackerError> {
        let mut log_regret = state.log_regret_discount;
        let mut log_strategy = state.log_strategy_discount;
        if log_regret.is_empty() && log_strategy.is_empty() {
            log_regret.push(0.0);
            log_strategy.push(0.0);
        }
        if log_regret.len() != log_strategy.len() || log_regret[0] != 0.0 {
            return Err(TrackerError::Corrupt(
                "discount histories disagree".to_string(),
            ));
        }
        let now = log_regret.len() - 1;

        let mut row_states = state.rows;
        if row_states.is_empty() && !state.regrets.is_empty() {
            row_states = legacy_rows(state.regrets, state.strategy_sums, state.action_names)?;
        }

        KeyFormat::detect_all(row_states.iter().map(|r| r.key.as_str()))?;

        let mut rows = FxHashMap::with_capacity_and_hasher(row_states.len(), Default::default());
        for rs in row_states {
            if rs.regrets.len() != rs.actions.len() || rs.strategy_sums.len() != rs.actions.len() {
                return Err(TrackerError::Corrupt(format!(
                    "row {} has {} actions, {} regrets, {} strategy sums",
                    rs.key,
                    rs.actions.len(),
                    rs.regrets.len(),
                    rs.strategy_sums.len()
                )));
            }
            if rs.generation > now {
                return Err(TrackerError::Corrupt(format!(
                    "row {} is at generation {} beyond {}",
                    rs.key, rs.generation, now
                )));
            }
            rows.insert(
                rs.key,
                Row {
                    actions: rs.actions,
                    regrets: rs.regrets,
                    strategy_sums: rs.strategy_sums,
                    generation: rs.generation,
                },
            );
        }

        self.rows = rows;
        self.log_regret = log_regret;
        self.log_strategy = log_strategy;
        Ok(())
    }
}

fn normalize_or_uniform(mut weights: Vec<f64>) -> Vec<f64> {
    let n = weights.len();
    let total: f64 = weights.iter().sum();
    if total > 0.0 && total.is_finite() {
        weights.iter_mut().for_each(|w| *w /= total);
        weights
    } else {
        vec![1.0 / n as f64; n]
    }
}

fn legacy_rows(
    regrets: FxHashMap<String, Vec<f64>>,
    mut strategy_sums: FxHashMap<String, Vec<f64>>,
    action_names: FxHashMap<String, Vec<String>>,
) -> Result<Vec<RowState>, TrackerError> {
    let mut rows = Vec::with_capacity(regrets.len());
    for (key, r) in regrets {
        let names = action_names.get(&key).ok_or_else(|| {
            TrackerError::Corrupt(format!("legacy row {key} has no action names"))
        })?;
        let actions = names
            .iter()
            .map(|n| n.parse::<AbstractAction>())
            .collect::<Result<Vec<_>, _>>()?;
        let sums = strategy_sums
            .remove(&key)
            .unwrap_or_else(|| vec![0.0; actions.len()]);
        rows.push(RowState {
            key,
            actions,
            regrets: r,
            strategy_sums: sums,
            generation: 0,
        });
    }
    rows.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(rows)
}

/// One serialized row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowState {
    /// Infoset key.
    pub key: String,
    /// Actions in slot order.
    pub actions: Vec<AbstractAction>,
    /// Raw cumulative regrets (before pending discounts).
    pub regrets: Vec<f64>,
    /// Raw cumulative strategy weights (before pending discounts).
    pub strategy_sums: Vec<f64>,
    /// Discount generation the raw values are expressed in.
    #[serde(default)]
    pub generation: usize,
}

/// Serializable tracker contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerState {
    /// Rows sorted by key.
    #[serde(default)]
    pub rows: Vec<RowState>,
    /// Cumulative ln regret discount per generation.
    #[serde(default)]
    pub log_regret_discount: Vec<f64>,
    /// Cumulative ln strategy discount per generation.
    #[serde(default)]
    pub log_strategy_discount: Vec<f64>,
    /// Flat regrets of the older export layout.
    #[serde(default, skip_serializing_if = "FxHashMap::is_empty")]
    pub regrets: FxHashMap<String, Vec<f64>>,
    /// Flat strategy sums of the older export layout.
    #[serde(default, skip_serializing_if = "FxHashMap::is_empty")]
    pub strategy_sums: FxHashMap<String, Vec<f64>>,
    /// Action codes of the older export layout.
    #[serde(default, skip_serializing_if = "FxHashMap::is_empty")]
    pub action_names: FxHashMap<String, Vec<String>>,
}

/// Snapshot of average strategies for CI calculation.
#[derive(Debug, Clone, Default)]
pub struct StrategySnapshot {
    /// Average strategies: info_key -> [probability per action slot]
    pub strategies: FxHashMap<String, Vec<f64>>,
    /// Strategy sum totals: info_key -> sum of all strategy weights
    /// Used to determine if an info set has been visited
    pub totals: FxHashMap<String, f64>,
}

impl RegretTracker {
    fn row_average(&self, row: &Row) -> (Vec<f64>, f64) {
        let total: f64 = row.strategy_sums.iter().sum();
        (normalize_or_uniform(row.strategy_sums.clone()), total)
    }

    /// Create a snapshot of all current average strategies.
    ///
    /// Used for calculating the Convergence Indicator (CI).
    pub fn snapshot_strategies(&self) -> StrategySnapshot {
        let mut strategies = FxHashMap::default();
        let mut totals = FxHashMap::default();
        for (key, row) in &self.rows {
            let (avg, total) = self.row_average(row);
            strategies.insert(key.clone(), avg);
            totals.insert(key.clone(), total);
        }
        StrategySnapshot { strategies, totals }
    }

    /// Calculate the Convergence Indicator (CI) against a snapshot.
    ///
    /// CI measures how much average strategies moved since the snapshot:
    /// 100 times the mean L1 change per visited info set. Rows discovered
    /// since the snapshot are compared against uniform.
    ///
    /// - CI > 20: very early training, strategies unstable
    /// - CI 10-20: still learning
    /// - CI < 10: bare minimum for usable solution
    /// - CI ~ 1: fully converged
    pub fn calculate_ci(&self, snapshot: &StrategySnapshot) -> f64 {
        let mut total_change = 0.0;
        let mut num_info_sets = 0;

        for key in self.keys() {
            let Some(row) = self.rows.get(key) else {
                continue;
            };
            let (new_strategy, current_total) = self.row_average(row);
            let old_total = snapshot.totals.get(key).copied().unwrap_or(0.0);
            if current_total == 0.0 && old_total == 0.0 {
                continue;
            }

            let n = new_strategy.len();
            let change: f64 = match snapshot.strategies.get(key) {
                // Slots appended since the snapshot count from zero.
                Some(old) => new_strategy
                    .iter()
                    .enumerate()
                    .map(|(i, &p)| (p - old.get(i).copied().unwrap_or(0.0)).abs())
                    .sum(),
                None => new_strategy
                    .iter()
                    .map(|&p| (p - 1.0 / n as f64).abs())
                    .sum(),
            };
            total_change += change;
            num_info_sets += 1;
        }

        if num_info_sets == 0 {
            return f64::INFINITY;
        }
        100.0 * total_change / num_info_sets as f64
    }
}
