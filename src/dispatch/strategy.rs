//! Strategy configuration: the string-keyed settings accepted from files and
//! runtime controls, and the typed configuration the engine runs on.

use serde::{Deserialize, Serialize};

use crate::assets::AssetKind;
use crate::error::DispatchError;

/// Maximum number of concurrent selection orderings.
pub const MAX_ORDERINGS: usize = 3;

/// Declares a unit-variant enum with stable snake_case labels.
macro_rules! labeled_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($label => Some($name::$variant),)+
                    _ => None,
                }
            }

            fn labels() -> String {
                Self::ALL
                    .iter()
                    .map(|v| format!("\"{}\"", v.as_str()))
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labeled_enum!(
    /// Subtypes of the deterministic-policy framework.
    DeterministicPolicy {
        Static => "static",
        StateMachine => "state_machine",
        ThresholdTriggered => "threshold_triggered",
    }
);

labeled_enum!(
    /// Re-ranking criterion of the greedy-myopic framework.
    GreedyCriterion {
        Capacity => "capacity",
        Risk => "risk",
        Efficiency => "efficiency",
    }
);

labeled_enum!(
    /// Monte-Carlo adjustment used by the stochastic framework.
    StochasticMode {
        ExpectedValue => "expected_value",
        ProbabilisticGuarantee => "probabilistic_guarantee",
        ScenarioMedian => "scenario_median",
    }
);

labeled_enum!(
    /// Correction law of the feedback-control framework.
    FeedbackLaw {
        Proportional => "proportional",
        ProportionalTrust => "proportional_trust",
        Pid => "pid",
    }
);

labeled_enum!(
    ObjectiveFunction {
        Capacity => "capacity",
        RiskMinimization => "risk_minimization",
        Efficiency => "efficiency",
        RegretMinimization => "regret_minimization",
        LearningOriented => "learning_oriented",
    }
);

labeled_enum!(
    /// Asset-ranking criteria, grouped into type priority, performance,
    /// state and fairness families.
    SelectionOrdering {
        AssetTypePriority => "asset_type_priority",
        Trust => "trust",
        Performance => "performance",
        LowVariance => "low_variance",
        Headroom => "headroom",
        ComfortCost => "comfort_cost",
        SocBuffer => "soc_buffer",
        Recency => "recency",
        RoundRobin => "round_robin",
        Fatigue => "fatigue",
    }
);

labeled_enum!(
    RiskPosture {
        RiskAverse => "risk_averse",
        DeadlineAware => "deadline_aware",
        OpportunitySeeking => "opportunity_seeking",
    }
);

labeled_enum!(
    FeedbackMode {
        OpenLoop => "open_loop",
        ErrorCorrection => "error_correction",
        TrustWeighted => "trust_weighted",
    }
);

impl RiskPosture {
    /// Multiplier applied to the drop-risk heuristic.
    pub fn conservation(&self) -> f32 {
        match self {
            RiskPosture::RiskAverse => 1.5,
            RiskPosture::DeadlineAware => 1.0,
            RiskPosture::OpportunitySeeking => 0.7,
        }
    }
}

/// Decision framework with its subtype. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "framework", content = "subtype", rename_all = "snake_case")]
pub enum Framework {
    DeterministicPolicy(DeterministicPolicy),
    GreedyMyopic(GreedyCriterion),
    Stochastic(StochasticMode),
    FeedbackControl(FeedbackLaw),
}

impl Framework {
    pub const NAMES: &'static [&'static str] = &[
        "deterministic_policy",
        "greedy_myopic",
        "stochastic",
        "feedback_control",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Framework::DeterministicPolicy(_) => "deterministic_policy",
            Framework::GreedyMyopic(_) => "greedy_myopic",
            Framework::Stochastic(_) => "stochastic",
            Framework::FeedbackControl(_) => "feedback_control",
        }
    }

    pub fn subtype(&self) -> &'static str {
        match self {
            Framework::DeterministicPolicy(p) => p.as_str(),
            Framework::GreedyMyopic(c) => c.as_str(),
            Framework::Stochastic(m) => m.as_str(),
            Framework::FeedbackControl(l) => l.as_str(),
        }
    }

    /// Resolves a framework/subtype pair.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfiguration`] for an unknown
    /// framework or a subtype that belongs to a different framework.
    pub fn parse(framework: &str, subtype: &str) -> Result<Self, DispatchError> {
        fn sub<T>(
            framework: &str,
            subtype: &str,
            parsed: Option<T>,
            labels: String,
        ) -> Result<T, DispatchError> {
            parsed.ok_or_else(|| {
                DispatchError::invalid(
                    "subtype",
                    format!("\"{subtype}\" is not a {framework} subtype, expected one of {labels}"),
                )
            })
        }

        match framework {
            "deterministic_policy" => sub(
                framework,
                subtype,
                DeterministicPolicy::parse(subtype),
                DeterministicPolicy::labels(),
            )
            .map(Framework::DeterministicPolicy),
            "greedy_myopic" => sub(
                framework,
                subtype,
                GreedyCriterion::parse(subtype),
                GreedyCriterion::labels(),
            )
            .map(Framework::GreedyMyopic),
            "stochastic" => sub(
                framework,
                subtype,
                StochasticMode::parse(subtype),
                StochasticMode::labels(),
            )
            .map(Framework::Stochastic),
            "feedback_control" => sub(
                framework,
                subtype,
                FeedbackLaw::parse(subtype),
                FeedbackLaw::labels(),
            )
            .map(Framework::FeedbackControl),
            other => Err(DispatchError::invalid(
                "framework",
                format!(
                    "unknown framework \"{other}\", expected one of {}",
                    Self::NAMES.join(", ")
                ),
            )),
        }
    }
}

/// Per-asset-type dispatch intensity dials (0 to 100).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntensityDials {
    pub hvac: f32,
    pub battery: f32,
    pub ev: f32,
    pub fleet_site: f32,
    pub ci_building: f32,
}

impl Default for IntensityDials {
    fn default() -> Self {
        Self {
            hvac: 50.0,
            battery: 50.0,
            ev: 50.0,
            fleet_site: 50.0,
            ci_building: 50.0,
        }
    }
}

impl IntensityDials {
    pub fn get(&self, kind: AssetKind) -> f32 {
        match kind {
            AssetKind::Hvac => self.hvac,
            AssetKind::Battery => self.battery,
            AssetKind::Ev => self.ev,
            AssetKind::FleetSite => self.fleet_site,
            AssetKind::CiBuilding => self.ci_building,
        }
    }

    fn validate(&self) -> Result<(), DispatchError> {
        for kind in AssetKind::ALL {
            let d = self.get(kind);
            if !(0.0..=100.0).contains(&d) {
                return Err(DispatchError::invalid(
                    format!("intensity.{kind}"),
                    format!("must be in [0, 100], got {d}"),
                ));
            }
        }
        Ok(())
    }
}

/// String-keyed strategy settings as they appear in scenario files and
/// runtime updates. Validated into a [`StrategyConfig`] before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategySettings {
    pub framework: String,
    pub subtype: String,
    pub objective: String,
    /// Selection orderings in priority order (1 to 3 entries).
    pub orderings: Vec<String>,
    pub risk_posture: String,
    pub feedback_mode: String,
    /// Reserve margin used by objective-based target scaling (fraction).
    pub reserve_margin: f32,
    pub intensity: IntensityDials,
}

impl Default for StrategySettings {
    fn default() -> Self {
        StrategyConfig::default().settings()
    }
}

/// Partial update merged onto existing settings. `None` keeps the current
/// value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategyPatch {
    pub framework: Option<String>,
    pub subtype: Option<String>,
    pub objective: Option<String>,
    pub orderings: Option<Vec<String>>,
    pub risk_posture: Option<String>,
    pub feedback_mode: Option<String>,
    pub reserve_margin: Option<f32>,
    pub intensity: Option<IntensityDials>,
}

impl StrategySettings {
    /// Returns a copy with every `Some` field of `patch` applied.
    pub fn merged(&self, patch: &StrategyPatch) -> Self {
        let mut next = self.clone();
        macro_rules! merge_field {
            ($name:ident) => {
                if let Some(v) = &patch.$name {
                    next.$name = v.clone();
                }
            };
        }
        merge_field!(framework);
        merge_field!(subtype);
        merge_field!(objective);
        merge_field!(orderings);
        merge_field!(risk_posture);
        merge_field!(feedback_mode);
        merge_field!(reserve_margin);
        merge_field!(intensity);
        next
    }

    /// Validates and converts into a typed configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfiguration`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<StrategyConfig, DispatchError> {
        let framework = Framework::parse(&self.framework, &self.subtype)?;

        let objective = ObjectiveFunction::parse(&self.objective).ok_or_else(|| {
            DispatchError::invalid(
                "objective",
                format!(
                    "unknown objective \"{}\", expected one of {}",
                    self.objective,
                    ObjectiveFunction::labels()
                ),
            )
        })?;

        if self.orderings.is_empty() || self.orderings.len() > MAX_ORDERINGS {
            return Err(DispatchError::invalid(
                "orderings",
                format!(
                    "must list 1 to {MAX_ORDERINGS} orderings, got {}",
                    self.orderings.len()
                ),
            ));
        }
        let mut orderings = Vec::with_capacity(self.orderings.len());
        for name in &self.orderings {
            let ordering = SelectionOrdering::parse(name).ok_or_else(|| {
                DispatchError::invalid(
                    "orderings",
                    format!(
                        "unknown ordering \"{name}\", expected one of {}",
                        SelectionOrdering::labels()
                    ),
                )
            })?;
            if orderings.contains(&ordering) {
                return Err(DispatchError::invalid(
                    "orderings",
                    format!("duplicate ordering \"{name}\""),
                ));
            }
            orderings.push(ordering);
        }

        let risk_posture = RiskPosture::parse(&self.risk_posture).ok_or_else(|| {
            DispatchError::invalid(
                "risk_posture",
                format!(
                    "unknown risk posture \"{}\", expected one of {}",
                    self.risk_posture,
                    RiskPosture::labels()
                ),
            )
        })?;

        let feedback_mode = FeedbackMode::parse(&self.feedback_mode).ok_or_else(|| {
            DispatchError::invalid(
                "feedback_mode",
                format!(
                    "unknown feedback mode \"{}\", expected one of {}",
                    self.feedback_mode,
                    FeedbackMode::labels()
                ),
            )
        })?;

        if !self.reserve_margin.is_finite() || !(0.0..=1.0).contains(&self.reserve_margin) {
            return Err(DispatchError::invalid(
                "reserve_margin",
                format!("must be in [0, 1], got {}", self.reserve_margin),
            ));
        }
        self.intensity.validate()?;

        Ok(StrategyConfig {
            framework,
            objective,
            orderings,
            risk_posture,
            feedback_mode,
            reserve_margin: self.reserve_margin,
            intensity: self.intensity,
        })
    }
}

/// Validated strategy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub framework: Framework,
    pub objective: ObjectiveFunction,
    /// Between 1 and [`MAX_ORDERINGS`] distinct orderings.
    pub orderings: Vec<SelectionOrdering>,
    pub risk_posture: RiskPosture,
    pub feedback_mode: FeedbackMode,
    pub reserve_margin: f32,
    pub intensity: IntensityDials,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            framework: Framework::DeterministicPolicy(DeterministicPolicy::Static),
            objective: ObjectiveFunction::Capacity,
            orderings: vec![
                SelectionOrdering::AssetTypePriority,
                SelectionOrdering::Headroom,
                SelectionOrdering::Recency,
            ],
            risk_posture: RiskPosture::DeadlineAware,
            feedback_mode: FeedbackMode::OpenLoop,
            reserve_margin: 0.1,
            intensity: IntensityDials::default(),
        }
    }
}

impl StrategyConfig {
    /// Converts back into string-keyed settings.
    pub fn settings(&self) -> StrategySettings {
        StrategySettings {
            framework: self.framework.name().to_string(),
            subtype: self.framework.subtype().to_string(),
            objective: self.objective.as_str().to_string(),
            orderings: self
                .orderings
                .iter()
                .map(|o| o.as_str().to_string())
                .collect(),
            risk_posture: self.risk_posture.as_str().to_string(),
            feedback_mode: self.feedback_mode.as_str().to_string(),
            reserve_margin: self.reserve_margin,
            intensity: self.intensity,
        }
    }

    /// Applies a partial update, validating the merged result.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfiguration`] and leaves `self`
    /// unchanged when the merged settings are invalid.
    pub fn apply(&mut self, patch: &StrategyPatch) -> Result<(), DispatchError> {
        *self = self.settings().merged(patch).validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> StrategySettings {
        StrategySettings::default()
    }

    #[test]
    fn default_settings_validate() {
        let cfg = settings().validate();
        assert_eq!(cfg, Ok(StrategyConfig::default()));
    }

    #[test]
    fn subtype_must_match_framework() {
        let mut s = settings();
        s.framework = "greedy_myopic".into();
        s.subtype = "pid".into();
        let err = s.validate().unwrap_err();
        let DispatchError::InvalidConfiguration { field, .. } = err;
        assert_eq!(field, "subtype");
    }

    #[test]
    fn every_framework_subtype_pair_parses() {
        for (fw, subs) in [
            ("deterministic_policy", DeterministicPolicy::ALL.len()),
            ("greedy_myopic", GreedyCriterion::ALL.len()),
            ("stochastic", StochasticMode::ALL.len()),
            ("feedback_control", FeedbackLaw::ALL.len()),
        ] {
            assert_eq!(subs, 3, "{fw}");
        }
        let f = Framework::parse("feedback_control", "pid").unwrap();
        assert_eq!(f, Framework::FeedbackControl(FeedbackLaw::Pid));
        assert_eq!(Framework::parse(f.name(), f.subtype()), Ok(f));
    }

    #[test]
    fn ordering_list_bounds() {
        let mut s = settings();
        s.orderings.clear();
        assert!(s.validate().is_err());

        s.orderings = vec![
            "trust".into(),
            "headroom".into(),
            "recency".into(),
            "fatigue".into(),
        ];
        assert!(s.validate().is_err());

        s.orderings = vec!["trust".into(), "trust".into()];
        assert!(s.validate().is_err());

        s.orderings = vec!["round_robin".into()];
        assert!(s.validate().is_ok());
    }

    #[test]
    fn intensity_out_of_range_rejected() {
        let mut s = settings();
        s.intensity.ev = 120.0;
        let DispatchError::InvalidConfiguration { field, .. } = s.validate().unwrap_err();
        assert_eq!(field, "intensity.ev");
    }

    #[test]
    fn patch_merges_only_given_fields() {
        let mut cfg = StrategyConfig::default();
        cfg.apply(&StrategyPatch {
            risk_posture: Some("risk_averse".into()),
            ..StrategyPatch::default()
        })
        .unwrap();
        assert_eq!(cfg.risk_posture, RiskPosture::RiskAverse);
        assert_eq!(cfg.orderings, StrategyConfig::default().orderings);
    }

    #[test]
    fn rejected_patch_leaves_config_unchanged() {
        let mut cfg = StrategyConfig::default();
        let before = cfg.clone();
        let err = cfg.apply(&StrategyPatch {
            framework: Some("stochastic".into()),
            ..StrategyPatch::default()
        });
        assert!(err.is_err());
        assert_eq!(cfg, before);
    }

    #[test]
    fn settings_parse_from_toml() {
        let s: StrategySettings = toml::from_str(
            r#"
framework = "stochastic"
subtype = "scenario_median"
orderings = ["trust", "soc_buffer"]

[intensity]
battery = 80
"#,
        )
        .unwrap();
        let cfg = s.validate().unwrap();
        assert_eq!(
            cfg.framework,
            Framework::Stochastic(StochasticMode::ScenarioMedian)
        );
        assert_eq!(cfg.intensity.battery, 80.0);
        assert_eq!(cfg.intensity.hvac, 50.0);
    }
}
