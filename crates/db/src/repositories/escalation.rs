//! Escalation repository.

use tracing::info;

use crate::entities::{Escalation, NewEscalation};
use crate::store::{Collection, DataStore};

/// Escalation persistence.
pub trait EscalationRepository {
    /// Record an escalation and stamp the report's `escalated_at`.
    fn add_escalation(&mut self, data: NewEscalation) -> Escalation;

    /// Escalations of one report, or all of them.
    fn escalations(&self, report_id: Option<&str>) -> Vec<Escalation>;
}

impl EscalationRepository for DataStore {
    fn add_escalation(&mut self, data: NewEscalation) -> Escalation {
        let now = self.now();
        let id = self.next_id(self.escalations.iter().map(|e| e.id.as_str()));
        let escalation = Escalation {
            id,
            report_id: data.report_id,
            escalation_type: data.escalation_type,
            reason: data.reason,
            escalated_to: data.escalated_to,
            escalated_by: data.escalated_by,
            created_at: now,
        };
        self.escalations.push(escalation.clone());

        let mut touched = vec![Collection::Escalations];
        if let Some(report) = self
            .reports
            .iter_mut()
            .find(|r| r.id == escalation.report_id)
        {
            report.escalated_at = Some(now);
            report.last_updated_at = now;
            touched.push(Collection::Reports);
        }

        self.persist(&touched);
        info!(
            report_id = %escalation.report_id,
            escalation_type = escalation.escalation_type.as_str(),
            escalated_to = %escalation.escalated_to,
            "Report escalated"
        );
        escalation
    }

    fn escalations(&self, report_id: Option<&str>) -> Vec<Escalation> {
        match report_id {
            Some(id) => self
                .escalations
                .iter()
                .filter(|e| e.report_id == id)
                .cloned()
                .collect(),
            None => self.escalations.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use civic_common::Clock;
    use crate::entities::{EscalationTarget, EscalationType};
    use crate::repositories::ReportRepository;
    use crate::test_utils::{TestStore, new_report};

    fn manual(report_id: &str) -> NewEscalation {
        NewEscalation {
            report_id: report_id.to_string(),
            escalation_type: EscalationType::Manual,
            reason: "No crew assigned".to_string(),
            escalated_to: EscalationTarget::Manager,
            escalated_by: "Officer Dewi".to_string(),
        }
    }

    #[test]
    fn test_add_escalation_stamps_report() {
        let mut t = TestStore::new();
        let report = t.store.add_report(new_report("Broken street lamp"));
        t.clock.advance(chrono::Duration::days(2));

        let escalation = t.store.add_escalation(manual(&report.id));
        let stored = t.store.get_report(&report.id).unwrap();
        assert_eq!(stored.escalated_at, Some(t.clock.now()));
        assert_eq!(stored.last_updated_at, t.clock.now());
        assert_eq!(escalation.created_at, t.clock.now());
        assert_eq!(t.store.escalations(Some(&report.id)), vec![escalation]);
    }

    #[test]
    fn test_escalation_for_unknown_report_is_still_recorded() {
        let mut t = TestStore::new();
        t.store.add_escalation(manual("gone"));
        assert_eq!(t.store.escalations(None).len(), 1);
        assert!(t.store.escalations(Some("other")).is_empty());
    }
}
