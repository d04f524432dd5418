//! Closed set of descriptor kinds and their fixed structural shape.
//!
//! Every rule that depends on "what kind of node is this" (cardinality,
//! allowed parents, single vs multi state, state category) is a lookup into
//! [`DescriptorKind::shape`]. The table is compiled in and never configured at
//! runtime.
//!
//! The set holds the concrete BICEPS descriptor types only. Abstract bases
//! (metric, operation, context, alert) never appear as nodes, so they have no
//! variant of their own.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How many children of one kind a single parent may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    Single,
    Many,
}

/// Grouping of states used to type state batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCategory {
    Component,
    Metric,
    Alert,
    Context,
    Operation,
}

impl fmt::Display for StateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StateCategory::Component => "component",
            StateCategory::Metric => "metric",
            StateCategory::Alert => "alert",
            StateCategory::Context => "context",
            StateCategory::Operation => "operation",
        };
        f.write_str(label)
    }
}

/// Static metadata attached to a [`DescriptorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindShape {
    pub cardinality: Cardinality,
    /// Kinds this kind may be inserted under. Empty for the root kind.
    pub allowed_parents: &'static [DescriptorKind],
    /// Context descriptors own a dynamic set of independently handled states.
    pub multi_state: bool,
    pub category: StateCategory,
}

/// Concrete descriptor kinds of the device tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorKind {
    Mds,
    Vmd,
    Channel,
    Clock,
    Battery,
    SystemContext,
    Sco,
    AlertSystem,
    AlertCondition,
    LimitAlertCondition,
    AlertSignal,
    NumericMetric,
    StringMetric,
    EnumStringMetric,
    RealTimeSampleArrayMetric,
    DistributionSampleArrayMetric,
    PatientContext,
    LocationContext,
    EnsembleContext,
    OperatorContext,
    WorkflowContext,
    MeansContext,
    SetValueOperation,
    SetStringOperation,
    ActivateOperation,
    SetContextStateOperation,
    SetMetricStateOperation,
    SetComponentStateOperation,
    SetAlertStateOperation,
}

const ROOT: &[DescriptorKind] = &[];
const UNDER_MDS: &[DescriptorKind] = &[DescriptorKind::Mds];
const UNDER_MDS_OR_VMD: &[DescriptorKind] = &[DescriptorKind::Mds, DescriptorKind::Vmd];
const UNDER_VMD: &[DescriptorKind] = &[DescriptorKind::Vmd];
const UNDER_CHANNEL: &[DescriptorKind] = &[DescriptorKind::Channel];
const UNDER_ALERT_SYSTEM: &[DescriptorKind] = &[DescriptorKind::AlertSystem];
const UNDER_SYSTEM_CONTEXT: &[DescriptorKind] = &[DescriptorKind::SystemContext];
const UNDER_SCO: &[DescriptorKind] = &[DescriptorKind::Sco];

const fn shape(
    cardinality: Cardinality,
    allowed_parents: &'static [DescriptorKind],
    multi_state: bool,
    category: StateCategory,
) -> KindShape {
    KindShape {
        cardinality,
        allowed_parents,
        multi_state,
        category,
    }
}

impl DescriptorKind {
    /// Every kind, in declaration order.
    pub const ALL: [DescriptorKind; 29] = [
        DescriptorKind::Mds,
        DescriptorKind::Vmd,
        DescriptorKind::Channel,
        DescriptorKind::Clock,
        DescriptorKind::Battery,
        DescriptorKind::SystemContext,
        DescriptorKind::Sco,
        DescriptorKind::AlertSystem,
        DescriptorKind::AlertCondition,
        DescriptorKind::LimitAlertCondition,
        DescriptorKind::AlertSignal,
        DescriptorKind::NumericMetric,
        DescriptorKind::StringMetric,
        DescriptorKind::EnumStringMetric,
        DescriptorKind::RealTimeSampleArrayMetric,
        DescriptorKind::DistributionSampleArrayMetric,
        DescriptorKind::PatientContext,
        DescriptorKind::LocationContext,
        DescriptorKind::EnsembleContext,
        DescriptorKind::OperatorContext,
        DescriptorKind::WorkflowContext,
        DescriptorKind::MeansContext,
        DescriptorKind::SetValueOperation,
        DescriptorKind::SetStringOperation,
        DescriptorKind::ActivateOperation,
        DescriptorKind::SetContextStateOperation,
        DescriptorKind::SetMetricStateOperation,
        DescriptorKind::SetComponentStateOperation,
        DescriptorKind::SetAlertStateOperation,
    ];

    pub const fn shape(self) -> KindShape {
        use Cardinality::{Many, Single};
        use StateCategory::{Alert, Component, Context, Metric, Operation};

        match self {
            DescriptorKind::Mds => shape(Many, ROOT, false, Component),
            DescriptorKind::Vmd => shape(Many, UNDER_MDS, false, Component),
            DescriptorKind::Channel => shape(Many, UNDER_VMD, false, Component),
            DescriptorKind::Clock => shape(Single, UNDER_MDS, false, Component),
            DescriptorKind::Battery => shape(Many, UNDER_MDS, false, Component),
            DescriptorKind::SystemContext => shape(Single, UNDER_MDS, false, Component),
            DescriptorKind::Sco => shape(Single, UNDER_MDS_OR_VMD, false, Component),
            DescriptorKind::AlertSystem => shape(Single, UNDER_MDS_OR_VMD, false, Alert),
            DescriptorKind::AlertCondition
            | DescriptorKind::LimitAlertCondition
            | DescriptorKind::AlertSignal => shape(Many, UNDER_ALERT_SYSTEM, false, Alert),
            DescriptorKind::NumericMetric
            | DescriptorKind::StringMetric
            | DescriptorKind::EnumStringMetric
            | DescriptorKind::RealTimeSampleArrayMetric
            | DescriptorKind::DistributionSampleArrayMetric => {
                shape(Many, UNDER_CHANNEL, false, Metric)
            }
            DescriptorKind::PatientContext | DescriptorKind::LocationContext => {
                shape(Single, UNDER_SYSTEM_CONTEXT, true, Context)
            }
            DescriptorKind::EnsembleContext
            | DescriptorKind::OperatorContext
            | DescriptorKind::WorkflowContext
            | DescriptorKind::MeansContext => shape(Many, UNDER_SYSTEM_CONTEXT, true, Context),
            DescriptorKind::SetValueOperation
            | DescriptorKind::SetStringOperation
            | DescriptorKind::ActivateOperation
            | DescriptorKind::SetContextStateOperation
            | DescriptorKind::SetMetricStateOperation
            | DescriptorKind::SetComponentStateOperation
            | DescriptorKind::SetAlertStateOperation => shape(Many, UNDER_SCO, false, Operation),
        }
    }

    /// True for the kind that forms the top of the tree.
    pub const fn is_root(self) -> bool {
        matches!(self, DescriptorKind::Mds)
    }

    pub const fn is_multi_state(self) -> bool {
        self.shape().multi_state
    }

    pub const fn category(self) -> StateCategory {
        self.shape().category
    }

    pub fn allows_parent(self, parent: DescriptorKind) -> bool {
        self.shape().allowed_parents.contains(&parent)
    }

    pub fn label(self) -> &'static str {
        match self {
            DescriptorKind::Mds => "MdsDescriptor",
            DescriptorKind::Vmd => "VmdDescriptor",
            DescriptorKind::Channel => "ChannelDescriptor",
            DescriptorKind::Clock => "ClockDescriptor",
            DescriptorKind::Battery => "BatteryDescriptor",
            DescriptorKind::SystemContext => "SystemContextDescriptor",
            DescriptorKind::Sco => "ScoDescriptor",
            DescriptorKind::AlertSystem => "AlertSystemDescriptor",
            DescriptorKind::AlertCondition => "AlertConditionDescriptor",
            DescriptorKind::LimitAlertCondition => "LimitAlertConditionDescriptor",
            DescriptorKind::AlertSignal => "AlertSignalDescriptor",
            DescriptorKind::NumericMetric => "NumericMetricDescriptor",
            DescriptorKind::StringMetric => "StringMetricDescriptor",
            DescriptorKind::EnumStringMetric => "EnumStringMetricDescriptor",
            DescriptorKind::RealTimeSampleArrayMetric => "RealTimeSampleArrayMetricDescriptor",
            DescriptorKind::DistributionSampleArrayMetric => {
                "DistributionSampleArrayMetricDescriptor"
            }
            DescriptorKind::PatientContext => "PatientContextDescriptor",
            DescriptorKind::LocationContext => "LocationContextDescriptor",
            DescriptorKind::EnsembleContext => "EnsembleContextDescriptor",
            DescriptorKind::OperatorContext => "OperatorContextDescriptor",
            DescriptorKind::WorkflowContext => "WorkflowContextDescriptor",
            DescriptorKind::MeansContext => "MeansContextDescriptor",
            DescriptorKind::SetValueOperation => "SetValueOperationDescriptor",
            DescriptorKind::SetStringOperation => "SetStringOperationDescriptor",
            DescriptorKind::ActivateOperation => "ActivateOperationDescriptor",
            DescriptorKind::SetContextStateOperation => "SetContextStateOperationDescriptor",
            DescriptorKind::SetMetricStateOperation => "SetMetricStateOperationDescriptor",
            DescriptorKind::SetComponentStateOperation => "SetComponentStateOperationDescriptor",
            DescriptorKind::SetAlertStateOperation => "SetAlertStateOperationDescriptor",
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Type filter accepted by the read surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindFilter {
    #[default]
    Any,
    Kind(DescriptorKind),
    Category(StateCategory),
}

impl KindFilter {
    pub fn matches(self, kind: DescriptorKind) -> bool {
        match self {
            KindFilter::Any => true,
            KindFilter::Kind(expected) => expected == kind,
            KindFilter::Category(category) => kind.category() == category,
        }
    }
}

impl From<DescriptorKind> for KindFilter {
    fn from(kind: DescriptorKind) -> Self {
        KindFilter::Kind(kind)
    }
}

impl From<StateCategory> for KindFilter {
    fn from(category: StateCategory) -> Self {
        KindFilter::Category(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_lists_every_kind_once() {
        let mut kinds = DescriptorKind::ALL.to_vec();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), DescriptorKind::ALL.len());
    }

    #[test]
    fn only_mds_is_root_and_has_no_parents() {
        for kind in DescriptorKind::ALL {
            assert_eq!(kind.is_root(), kind.shape().allowed_parents.is_empty());
        }
        assert!(DescriptorKind::Mds.is_root());
    }

    #[test]
    fn context_kinds_are_exactly_the_multi_state_kinds() {
        for kind in DescriptorKind::ALL {
            assert_eq!(
                kind.is_multi_state(),
                kind.category() == StateCategory::Context,
                "{kind}"
            );
        }
    }

    #[test]
    fn sco_and_alert_system_accept_mds_or_vmd() {
        for kind in [DescriptorKind::Sco, DescriptorKind::AlertSystem] {
            assert!(kind.allows_parent(DescriptorKind::Mds));
            assert!(kind.allows_parent(DescriptorKind::Vmd));
            assert!(!kind.allows_parent(DescriptorKind::Channel));
            assert_eq!(kind.shape().cardinality, Cardinality::Single);
        }
    }

    #[test]
    fn filter_matches_kind_and_category() {
        let metric = DescriptorKind::NumericMetric;
        assert!(KindFilter::Any.matches(metric));
        assert!(KindFilter::from(metric).matches(metric));
        assert!(!KindFilter::from(DescriptorKind::StringMetric).matches(metric));
        assert!(KindFilter::from(StateCategory::Metric).matches(metric));
        assert!(!KindFilter::from(StateCategory::Alert).matches(metric));
    }
}
