//! Strategy validation and compilation.
//!
//! Everything that can be checked without bars is checked here, so a run
//! stops before any signal is computed: aliases, parameters, risk and exit
//! settings, condition syntax, and every name a condition refers to.

use std::collections::BTreeSet;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::engine::frame::{ATR_COLUMN, BAR_FIELDS, HELPER_COLUMNS, SESSION_COLUMN};
use crate::indicators::{Macd, QuarterGrid};

use super::compiled::{CompiledRule, CompiledStrategy, FeatureKind, ResolvedIndicator};
use super::expr::Expr;
use super::{ExitKind, IndicatorDef, IndicatorKind, SpecError, StrategySpec};

const DEFAULT_TP_RR: f64 = 2.0;
const DEFAULT_SL_ATR_MULT: f64 = 1.5;
const MAX_PERIOD: f64 = 100_000.0;

impl StrategySpec {
    /// Validate the document and parse its conditions.
    pub fn compile(&self) -> Result<CompiledStrategy, SpecError> {
        if self.name.trim().is_empty() {
            return Err(SpecError::EmptyName);
        }
        if self.instruments.iter().all(|i| i.trim().is_empty()) {
            return Err(SpecError::NoInstruments);
        }

        let indicators = self.resolve_indicators()?;

        let mut known: BTreeSet<String> = BAR_FIELDS
            .iter()
            .chain(HELPER_COLUMNS.iter())
            .chain([SESSION_COLUMN, ATR_COLUMN].iter())
            .map(|s| s.to_string())
            .collect();
        for ind in &indicators {
            known.extend(ind.output_names());
        }

        let mut rules = Vec::with_capacity(self.entries.len());
        for (index, entry) in self.entries.iter().enumerate() {
            let expr = Expr::parse(&entry.condition)
                .map_err(|source| SpecError::Condition { index, source })?;
            if let Some(name) = expr.columns().into_iter().find(|c| !known.contains(*c)) {
                return Err(SpecError::UnknownName {
                    index,
                    name: name.to_string(),
                });
            }
            rules.push(CompiledRule {
                side: entry.side,
                session: entry.session,
                condition: entry.condition.clone(),
                expr,
            });
        }

        let risk = &self.risk;
        if !(risk.fixed_fraction > 0.0 && risk.fixed_fraction <= 1.0) {
            return Err(SpecError::InvalidRisk(format!(
                "fixed_fraction must be in (0, 1], got {}",
                risk.fixed_fraction
            )));
        }
        if risk.max_positions == 0 {
            return Err(SpecError::InvalidRisk("max_positions must be at least 1".into()));
        }
        if risk.max_positions > 1 {
            warn!(
                max_positions = risk.max_positions,
                "only one concurrent position is simulated"
            );
        }

        let (tp_rr, sl_atr_mult) = self.resolve_exits()?;

        let canonical = serde_json::to_vec(self)?;
        let fingerprint = blake3::hash(&canonical).to_hex().to_string();

        debug!(
            strategy = %self.name,
            indicators = indicators.len(),
            rules = rules.len(),
            "strategy compiled"
        );

        Ok(CompiledStrategy {
            spec: self.clone(),
            indicators,
            rules,
            tp_rr,
            sl_atr_mult,
            fingerprint,
        })
    }

    fn resolve_indicators(&self) -> Result<Vec<ResolvedIndicator>, SpecError> {
        let reserved: BTreeSet<&str> = BAR_FIELDS
            .iter()
            .chain(HELPER_COLUMNS.iter())
            .chain([SESSION_COLUMN].iter())
            .copied()
            .collect();

        let mut seen = BTreeSet::new();
        let mut resolved = Vec::new();

        for (index, def) in self.indicators.iter().enumerate() {
            if def.alias.trim().is_empty() {
                return Err(SpecError::EmptyAlias { index });
            }
            let kind = match resolve_kind(def)? {
                Some(kind) => kind,
                None => {
                    warn!(alias = %def.alias, kind = ?def.kind, "skipping unknown indicator kind");
                    continue;
                }
            };
            let ind = ResolvedIndicator {
                alias: def.alias.clone(),
                kind,
            };
            for name in ind.output_names() {
                if name == ATR_COLUMN && !matches!(ind.kind, FeatureKind::Atr { .. }) {
                    return Err(SpecError::ReservedAlias(name));
                }
                if reserved.contains(name.as_str()) {
                    return Err(SpecError::ReservedAlias(name));
                }
                if !seen.insert(name.clone()) {
                    return Err(SpecError::DuplicateAlias(name));
                }
            }
            resolved.push(ind);
        }

        Ok(resolved)
    }

    fn resolve_exits(&self) -> Result<(f64, f64), SpecError> {
        let mut tp_rr = DEFAULT_TP_RR;
        let mut sl_atr_mult = DEFAULT_SL_ATR_MULT;
        let mut seen_tp_sl = false;

        for exit in &self.exits {
            match exit.kind {
                ExitKind::TpSl if !seen_tp_sl => {
                    seen_tp_sl = true;
                    if let Some(v) = exit_number(&exit.params, "tp_rr")? {
                        tp_rr = v;
                    }
                    if let Some(v) = exit_number(&exit.params, "sl_atr_mult")? {
                        sl_atr_mult = v;
                    }
                }
                ExitKind::TpSl => warn!("only the first TP_SL exit is used"),
                ExitKind::IndicatorCross | ExitKind::Time => {
                    warn!(exit = ?exit.kind, "exit type is declared but not simulated");
                }
            }
        }

        Ok((tp_rr, sl_atr_mult))
    }
}

fn exit_number(
    params: &std::collections::BTreeMap<String, JsonValue>,
    key: &str,
) -> Result<Option<f64>, SpecError> {
    match params.get(key) {
        None => Ok(None),
        Some(value) => match value.as_f64() {
            Some(v) if v > 0.0 && v.is_finite() => Ok(Some(v)),
            _ => Err(SpecError::InvalidExit(format!(
                "{key} must be a positive number, got {value}"
            ))),
        },
    }
}

fn resolve_kind(def: &IndicatorDef) -> Result<Option<FeatureKind>, SpecError> {
    let kind = match &def.kind {
        IndicatorKind::Sma => FeatureKind::Sma {
            period: period(def, "period", 50)?,
        },
        IndicatorKind::Ema => FeatureKind::Ema {
            period: period(def, "period", 21)?,
        },
        IndicatorKind::Rsi => FeatureKind::Rsi {
            period: period(def, "period", 14)?,
        },
        IndicatorKind::Atr => FeatureKind::Atr {
            period: period(def, "period", 14)?,
        },
        IndicatorKind::Macd => {
            let fast = period(def, "fast", 12)?;
            let slow = period(def, "slow", 26)?;
            let signal = period(def, "signal", 9)?;
            if fast >= slow {
                return Err(invalid(def, "fast", format!("must be below slow ({slow})")));
            }
            FeatureKind::Macd(Macd::new(fast, slow, signal))
        }
        IndicatorKind::QuarterGrid => {
            let size_pips = positive(def, "size_pips", 25.0)?;
            let pip = match number(def, "pip_scale")? {
                Some(_) => positive(def, "pip_scale", 0.0001)?,
                None => positive(def, "pip", 0.0001)?,
            };
            FeatureKind::QuarterGrid(QuarterGrid::new(size_pips, pip))
        }
        IndicatorKind::Session => FeatureKind::Session,
        IndicatorKind::Unknown(_) => return Ok(None),
    };
    Ok(Some(kind))
}

fn invalid(def: &IndicatorDef, param: &str, reason: String) -> SpecError {
    SpecError::InvalidParam {
        alias: def.alias.clone(),
        param: param.to_string(),
        reason,
    }
}

fn number(def: &IndicatorDef, key: &str) -> Result<Option<f64>, SpecError> {
    match def.params.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| invalid(def, key, format!("must be a number, got {value}"))),
    }
}

fn positive(def: &IndicatorDef, key: &str, default: f64) -> Result<f64, SpecError> {
    let v = number(def, key)?.unwrap_or(default);
    if v <= 0.0 {
        return Err(invalid(def, key, format!("must be positive, got {v}")));
    }
    Ok(v)
}

fn period(def: &IndicatorDef, key: &str, default: usize) -> Result<usize, SpecError> {
    let Some(v) = number(def, key)? else {
        return Ok(default);
    };
    if !(1.0..=MAX_PERIOD).contains(&v) || v.fract() != 0.0 {
        return Err(invalid(
            def,
            key,
            format!("must be a whole number between 1 and {MAX_PERIOD}, got {v}"),
        ));
    }
    Ok(v as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Session, Side};
    use crate::spec::GENERATOR_SAMPLE;

    fn sample() -> StrategySpec {
        StrategySpec::from_json(GENERATOR_SAMPLE).unwrap()
    }

    #[test]
    fn compiles_generator_document() {
        let compiled = sample().compile().unwrap();
        assert_eq!(compiled.rules.len(), 2);
        assert_eq!(compiled.rules[0].side, Side::Long);
        assert_eq!(compiled.rules[0].session, Some(Session::London));
        assert_eq!(compiled.tp_rr, 2.0);
        assert_eq!(compiled.sl_atr_mult, 1.5);
        assert_eq!(
            compiled.output_columns(),
            vec!["RSI_14", "ATR_14", "EMA_50", "QG", "QG_dist"]
        );
        assert_eq!(compiled.fingerprint.len(), 64);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = sample().compile().unwrap();
        let b = sample().compile().unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
        let mut changed = sample();
        changed.entries[0].condition = "(RSI_14 < 30) and (Close > EMA_50)".into();
        assert_ne!(changed.compile().unwrap().fingerprint, a.fingerprint);
    }

    #[test]
    fn unknown_condition_name_is_rejected() {
        // The generator sometimes references EMA_21 while declaring EMA_50.
        let mut spec = sample();
        spec.entries[0].condition = "(RSI_14 < 35) and (Close > EMA_21)".into();
        match spec.compile() {
            Err(SpecError::UnknownName { index, name }) => {
                assert_eq!(index, 0);
                assert_eq!(name, "EMA_21");
            }
            other => panic!("expected UnknownName, got {other:?}"),
        }
    }

    #[test]
    fn helper_columns_are_known_names() {
        let mut spec = sample();
        spec.entries[0].condition =
            "Sweep_low and RSI_now > RSI_prev and QG_dist_pips <= 6 and EMA_fast > EMA_slow".into();
        assert!(spec.compile().is_ok());
    }

    #[test]
    fn syntax_error_is_fatal() {
        let mut spec = sample();
        spec.entries[1].condition = "(RSI_14 > 65".into();
        assert!(matches!(
            spec.compile(),
            Err(SpecError::Condition { index: 1, .. })
        ));
    }

    #[test]
    fn duplicate_alias_is_rejected() {
        let mut spec = sample();
        spec.indicators[2].alias = "RSI_14".into();
        assert!(matches!(spec.compile(), Err(SpecError::DuplicateAlias(a)) if a == "RSI_14"));
    }

    #[test]
    fn derived_name_collision_is_rejected() {
        let mut spec = sample();
        spec.indicators[0].alias = "QG_dist".into();
        assert!(matches!(spec.compile(), Err(SpecError::DuplicateAlias(_))));
    }

    #[test]
    fn reserved_alias_is_rejected() {
        for name in ["Close", "Session", "RSI_now"] {
            let mut spec = sample();
            spec.indicators[0].alias = name.into();
            assert!(
                matches!(spec.compile(), Err(SpecError::ReservedAlias(_))),
                "{name} should be reserved"
            );
        }
    }

    #[test]
    fn unknown_kind_is_skipped() {
        let mut spec = sample();
        spec.indicators.push(IndicatorDef {
            kind: IndicatorKind::Unknown("Ichimoku".into()),
            params: Default::default(),
            alias: "ICH".into(),
        });
        let compiled = spec.compile().unwrap();
        assert_eq!(compiled.indicators.len(), 4);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let mut spec = sample();
        spec.indicators[0].params.insert("period".into(), 0.into());
        assert!(matches!(spec.compile(), Err(SpecError::InvalidParam { .. })));

        let mut spec = sample();
        spec.indicators[0]
            .params
            .insert("period".into(), "fourteen".into());
        assert!(matches!(spec.compile(), Err(SpecError::InvalidParam { .. })));

        let mut spec = sample();
        spec.indicators.push(IndicatorDef {
            kind: IndicatorKind::Macd,
            params: [("fast".to_string(), 26.into()), ("slow".to_string(), 12.into())]
                .into_iter()
                .collect(),
            alias: "MACD".into(),
        });
        assert!(matches!(spec.compile(), Err(SpecError::InvalidParam { .. })));
    }

    #[test]
    fn oversized_period_is_rejected() {
        let mut spec = sample();
        spec.indicators.push(IndicatorDef {
            kind: IndicatorKind::Macd,
            params: [
                ("fast".to_string(), 12.into()),
                ("slow".to_string(), 26.into()),
                ("signal".to_string(), 1e20.into()),
            ]
            .into_iter()
            .collect(),
            alias: "MACD".into(),
        });
        match spec.compile() {
            Err(SpecError::InvalidParam { param, .. }) => assert_eq!(param, "signal"),
            other => panic!("expected InvalidParam, got {other:?}"),
        }

        let mut spec = sample();
        spec.indicators[0].params.insert("period".into(), 100_000.into());
        assert!(spec.compile().is_ok());
    }

    #[test]
    fn atr_column_must_hold_an_atr() {
        let mut spec = sample();
        assert_eq!(spec.indicators[1].alias, "ATR_14");
        spec.indicators[1].kind = IndicatorKind::Rsi;
        assert!(matches!(spec.compile(), Err(SpecError::ReservedAlias(a)) if a == "ATR_14"));
    }

    #[test]
    fn default_params_apply() {
        let mut spec = sample();
        spec.indicators[2].params.clear();
        let compiled = spec.compile().unwrap();
        assert_eq!(compiled.indicators[2].kind, FeatureKind::Ema { period: 21 });
    }

    #[test]
    fn risk_and_exit_checks() {
        let mut spec = sample();
        spec.risk.fixed_fraction = 0.0;
        assert!(matches!(spec.compile(), Err(SpecError::InvalidRisk(_))));

        let mut spec = sample();
        spec.exits[0].params.insert("tp_rr".into(), (-1.0).into());
        assert!(matches!(spec.compile(), Err(SpecError::InvalidExit(_))));

        let mut spec = sample();
        spec.exits.clear();
        let compiled = spec.compile().unwrap();
        assert_eq!((compiled.tp_rr, compiled.sl_atr_mult), (2.0, 1.5));
    }

    #[test]
    fn empty_name_and_instruments() {
        let mut spec = sample();
        spec.name = " ".into();
        assert!(matches!(spec.compile(), Err(SpecError::EmptyName)));
        let mut spec = sample();
        spec.instruments.clear();
        assert!(matches!(spec.compile(), Err(SpecError::NoInstruments)));
    }
}
