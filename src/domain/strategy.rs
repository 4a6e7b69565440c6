//! Strategy composition: indicators, signals and rules in evaluation order.

use crate::domain::indicator_binding::IndicatorSpec;
use crate::domain::rule::Rule;
use crate::domain::signal::SignalSpec;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategySpec {
    pub name: String,
    pub indicators: Vec<IndicatorSpec>,
    pub signals: Vec<SignalSpec>,
    pub rules: Vec<Rule>,
}

impl StrategySpec {
    pub fn new(name: &str) -> Self {
        StrategySpec {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn indicator(mut self, spec: IndicatorSpec) -> Self {
        self.indicators.push(spec);
        self
    }

    pub fn signal(mut self, spec: SignalSpec) -> Self {
        self.signals.push(spec);
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }
}
