//! Roll-up of several sessions' analyses (typically the last five days)

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    AnalysisEngine, InstrumentContext, Result, RiskLevel, Side, SignalError, SignalEvent,
    TickSeries,
};

/// Sessions, counted from the most recent, that decide trend strength
const RECENT_SESSIONS: usize = 3;

/// One session to analyze
#[derive(Debug, Clone, Copy)]
pub struct SessionInput<'a> {
    /// `YYYYMMDD`; compared as text
    pub date: &'a str,
    pub series: &'a TickSeries,
}

impl<'a> SessionInput<'a> {
    pub fn new(date: &'a str, series: &'a TickSeries) -> Self {
        Self { date, series }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySignals {
    pub date: String,
    pub signal_count: usize,
    pub risk_level: RiskLevel,
    pub events: Vec<SignalEvent>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendStrength {
    Strong,
    Moderate,
    Weak,
}

/// How persistent sell pressure has been
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerPattern {
    Continuous,
    Frequent,
    Occasional,
    Normal,
}

impl DangerPattern {
    pub fn from_frequency(frequency: f64) -> Self {
        if frequency >= 0.8 {
            DangerPattern::Continuous
        } else if frequency >= 0.6 {
            DangerPattern::Frequent
        } else if frequency >= 0.4 {
            DangerPattern::Occasional
        } else {
            DangerPattern::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiDayPattern {
    /// Longest run of consecutive sessions with at least one signal
    pub consecutive_signal_days: usize,
    /// Share of sessions with at least one signal
    pub signal_frequency: f64,
    pub trend_strength: TrendStrength,
    /// Session with the most signals: best entry (buy) or most urgent (sell)
    pub key_day: Option<String>,
    /// Sell side only
    pub danger: Option<DangerPattern>,
}

/// Event tagged with the session it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatedSignal {
    #[serde(flatten)]
    pub event: SignalEvent,
    pub date: String,
    /// Position of the session in the input
    pub day_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiDayReport {
    pub side: Side,
    pub days: Vec<DaySignals>,
    pub pattern: MultiDayPattern,
    pub risk_level: RiskLevel,
    pub total_signals: usize,
    pub recommendations: Vec<String>,
    /// Newest session first, then by time within the session
    pub events: Vec<DatedSignal>,
}

/// Analyze each session with `engine`, then roll the results up.
///
/// Sessions with no ticks count as sessions without signals.
pub fn analyze_sessions(
    engine: &AnalysisEngine,
    side: Side,
    sessions: &[SessionInput<'_>],
    context: &InstrumentContext,
) -> Result<MultiDayReport> {
    if sessions.is_empty() {
        return Err(SignalError::InvalidInput("no sessions to analyze".into()));
    }

    let days: Vec<DaySignals> = sessions
        .par_iter()
        .map(|session| day_signals(engine, side, session, context))
        .collect::<Result<_>>()?;

    let pattern = detect_pattern(side, &days);
    let (risk_level, recommendations) = match side {
        Side::Buy => buy_verdict(&pattern),
        Side::Sell => sell_verdict(&pattern),
    };

    Ok(MultiDayReport {
        side,
        total_signals: days.iter().map(|d| d.signal_count).sum(),
        events: merge_events(&days),
        days,
        pattern,
        risk_level,
        recommendations,
    })
}

fn day_signals(
    engine: &AnalysisEngine,
    side: Side,
    session: &SessionInput<'_>,
    context: &InstrumentContext,
) -> Result<DaySignals> {
    if session.series.is_empty() {
        tracing::warn!(date = session.date, "session has no ticks");
        return Ok(DaySignals {
            date: session.date.to_string(),
            signal_count: 0,
            risk_level: RiskLevel::Low,
            events: Vec::new(),
            recommendations: Vec::new(),
        });
    }
    let report = engine.analyze(side, session.series, context, &[])?;
    Ok(DaySignals {
        date: session.date.to_string(),
        signal_count: report.summary.signal_count,
        risk_level: report.summary.risk_level,
        events: report.events,
        recommendations: report.summary.recommendations,
    })
}

fn detect_pattern(side: Side, days: &[DaySignals]) -> MultiDayPattern {
    let mut run = 0;
    let mut longest = 0;
    for day in days {
        if day.signal_count > 0 {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }

    let with_signals = days.iter().filter(|d| d.signal_count > 0).count();
    let signal_frequency = if days.is_empty() {
        0.0
    } else {
        with_signals as f64 / days.len() as f64
    };

    let recent = days
        .iter()
        .rev()
        .take(RECENT_SESSIONS)
        .filter(|d| d.signal_count > 0)
        .count();
    let trend_strength = match recent {
        0 => TrendStrength::Weak,
        1 => TrendStrength::Moderate,
        _ => TrendStrength::Strong,
    };

    // First session holding the maximum, and only if it had signals
    let key_day = days
        .iter()
        .fold(None::<&DaySignals>, |best, d| match best {
            Some(b) if d.signal_count <= b.signal_count => Some(b),
            _ => Some(d),
        })
        .filter(|d| d.signal_count > 0)
        .map(|d| d.date.clone());

    MultiDayPattern {
        consecutive_signal_days: longest,
        signal_frequency,
        trend_strength,
        key_day,
        danger: (side == Side::Sell).then(|| DangerPattern::from_frequency(signal_frequency)),
    }
}

fn buy_verdict(p: &MultiDayPattern) -> (RiskLevel, Vec<String>) {
    let (risk, text) = if p.consecutive_signal_days >= 3 {
        (RiskLevel::Low, "Buy signals three sessions running, strong trend, follow actively")
    } else if p.consecutive_signal_days >= 2 {
        (RiskLevel::Low, "Buy signals two sessions running, trend improving, consider joining")
    } else if p.signal_frequency >= 0.6 {
        (RiskLevel::Medium, "Buy signals on most recent sessions, worth close attention")
    } else if p.signal_frequency >= 0.4 {
        (RiskLevel::Medium, "Buy signals on some recent sessions, moderate attention")
    } else {
        (RiskLevel::High, "Few buy signals, stay on the sidelines")
    };

    let mut recommendations = vec![text.to_string()];
    if let Some(day) = &p.key_day {
        recommendations.push(format!("Best entry session: {day}"));
    }
    if p.trend_strength == TrendStrength::Strong {
        recommendations.push("Recent trend is strong, consider adding".to_string());
    }
    (risk, recommendations)
}

fn sell_verdict(p: &MultiDayPattern) -> (RiskLevel, Vec<String>) {
    let (risk, text) = if p.consecutive_signal_days >= 3 {
        (RiskLevel::High, "Sell signals three sessions running, reduce the position now")
    } else if p.consecutive_signal_days >= 2 {
        (RiskLevel::High, "Sell signals two sessions running, risk rising, reduce the position")
    } else if p.signal_frequency >= 0.8 {
        (RiskLevel::High, "Frequent sell signals, consider closing out and waiting")
    } else if p.signal_frequency >= 0.6 {
        (RiskLevel::Medium, "Many sell signals, trim the position")
    } else if p.signal_frequency >= 0.4 {
        (RiskLevel::Medium, "Some sell signals, hold and watch")
    } else {
        (RiskLevel::Low, "Few sell signals, continue holding")
    };

    let mut recommendations = vec![text.to_string()];
    if let Some(day) = &p.key_day {
        recommendations.push(format!("Strongest sell pressure on {day}, consider reducing"));
    }
    (risk, recommendations)
}

fn merge_events(days: &[DaySignals]) -> Vec<DatedSignal> {
    let mut merged: Vec<DatedSignal> = days
        .iter()
        .enumerate()
        .flat_map(|(day_index, day)| {
            day.events.iter().map(move |event| DatedSignal {
                event: event.clone(),
                date: day.date.clone(),
                day_index,
            })
        })
        .collect();
    merged.sort_by(|a, b| b.date.cmp(&a.date).then(a.event.time.cmp(&b.event.time)));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SessionTime, Severity, SignalKind};

    fn day(date: &str, count: usize) -> DaySignals {
        let events = (0..count)
            .map(|i| SignalEvent {
                kind: SignalKind::VolumeSurge,
                time: SessionTime::new_const(10, (30 - i) as u16),
                price: 10.0,
                volume: 1.0,
                description: String::new(),
                severity: Severity::Medium,
                source_index: i,
            })
            .collect();
        DaySignals {
            date: date.to_string(),
            signal_count: count,
            risk_level: RiskLevel::Low,
            events,
            recommendations: Vec::new(),
        }
    }

    #[test]
    fn test_pattern_counts() {
        let days = [day("20240101", 1), day("20240102", 0), day("20240103", 2), day("20240104", 2), day("20240105", 1)];
        let p = detect_pattern(Side::Buy, &days);

        assert_eq!(p.consecutive_signal_days, 3);
        assert!((p.signal_frequency - 0.8).abs() < 1e-12);
        assert_eq!(p.trend_strength, TrendStrength::Strong);
        assert_eq!(p.key_day.as_deref(), Some("20240103"));
        assert!(p.danger.is_none());
    }

    #[test]
    fn test_buy_verdict() {
        let days = [day("1", 0), day("2", 1), day("3", 0), day("4", 0), day("5", 0)];
        let (risk, recs) = buy_verdict(&detect_pattern(Side::Buy, &days));
        assert_eq!(risk, RiskLevel::High);
        assert_eq!(recs.len(), 2);

        let days = [day("1", 1), day("2", 1), day("3", 1)];
        let (risk, recs) = buy_verdict(&detect_pattern(Side::Buy, &days));
        assert_eq!(risk, RiskLevel::Low);
        assert_eq!(recs.len(), 3);
    }

    #[test]
    fn test_sell_verdict() {
        let days = [day("1", 0), day("2", 0), day("3", 0), day("4", 0), day("5", 0)];
        let p = detect_pattern(Side::Sell, &days);
        let (risk, recs) = sell_verdict(&p);
        assert_eq!(risk, RiskLevel::Low);
        assert_eq!(recs.len(), 1);
        assert_eq!(p.danger, Some(DangerPattern::Normal));

        let days = [day("1", 1), day("2", 0), day("3", 1), day("4", 0), day("5", 1)];
        let p = detect_pattern(Side::Sell, &days);
        assert_eq!(sell_verdict(&p).0, RiskLevel::Medium);
        assert_eq!(p.danger, Some(DangerPattern::Frequent));
    }

    #[test]
    fn test_merge_order() {
        let days = [day("20240101", 2), day("20240102", 1)];
        let merged = merge_events(&days);

        let dates: Vec<&str> = merged.iter().map(|e| e.date.as_str()).collect();
        assert_eq!(dates, vec!["20240102", "20240101", "20240101"]);
        assert_eq!(merged[0].day_index, 1);
        assert!(merged[1].event.time < merged[2].event.time);
    }

    #[test]
    fn test_empty_sessions_rejected() {
        let engine = crate::EngineBuilder::new().with_all_defaults().build().unwrap();
        let err = analyze_sessions(&engine, Side::Sell, &[], &InstrumentContext::new()).unwrap_err();
        assert!(matches!(err, SignalError::InvalidInput(_)));
    }
}
