//! Append-only transaction log.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    /// Adjustment-pass buy, or the initial lump-sum purchase.
    Buy,
    SellAll,
    SellAdjust,
    SweepBuy,
    PeriodicBuy,
}

impl TradeAction {
    pub fn is_sell(&self) -> bool {
        matches!(self, TradeAction::SellAll | TradeAction::SellAdjust)
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeAction::Buy => "BUY",
            TradeAction::SellAll => "SELL_ALL",
            TradeAction::SellAdjust => "SELL_ADJUST",
            TradeAction::SweepBuy => "SWEEP_BUY",
            TradeAction::PeriodicBuy => "PERIODIC_BUY",
        };
        f.write_str(s)
    }
}

/// A filled order. `fee` is commission on buys and tax on sells; `amount`
/// is gross (shares × price).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fill {
    pub action: TradeAction,
    pub ticker: String,
    pub shares: u64,
    pub price: f64,
    pub amount: f64,
    pub fee: f64,
}

impl Fill {
    /// Net change in cash: negative for buys.
    pub fn cash_delta(&self) -> f64 {
        if self.action.is_sell() {
            self.amount - self.fee
        } else {
            -(self.amount + self.fee)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    EvaluationStart,
    Deposit { amount: f64 },
    Trade(Fill),
    Info { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEvent {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::EvaluationStart => write!(f, "{} EVALUATION_START", self.date),
            EventKind::Deposit { amount } => write!(f, "{} DEPOSIT {:.2}", self.date, amount),
            EventKind::Trade(fill) => write!(
                f,
                "{} {} {} x{} @ {:.4} (fee {:.2})",
                self.date, fill.action, fill.ticker, fill.shares, fill.price, fill.fee
            ),
            EventKind::Info { message } => write!(f, "{} INFO {}", self.date, message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TransactionLog {
    events: Vec<LedgerEvent>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, date: NaiveDate, kind: EventKind) {
        self.events.push(LedgerEvent { date, kind });
    }

    pub fn info(&mut self, date: NaiveDate, message: impl Into<String>) {
        self.push(
            date,
            EventKind::Info {
                message: message.into(),
            },
        );
    }

    pub fn trade(&mut self, date: NaiveDate, fill: Fill) {
        log::debug!(
            "{} {} {} x{} @ {:.4}",
            date,
            fill.action,
            fill.ticker,
            fill.shares,
            fill.price
        );
        self.push(date, EventKind::Trade(fill));
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn fills(&self) -> impl Iterator<Item = (NaiveDate, &Fill)> {
        self.events.iter().filter_map(|e| match &e.kind {
            EventKind::Trade(fill) => Some((e.date, fill)),
            _ => None,
        })
    }

    /// Sum of commissions and taxes paid.
    pub fn total_fees(&self) -> f64 {
        self.fills().map(|(_, f)| f.fee).sum()
    }

    /// Events logged from index `from` onward.
    pub fn since(&self, from: usize) -> &[LedgerEvent] {
        &self.events[from.min(self.events.len())..]
    }
}
