#[cfg(test)]
mod tests {
    use crate::types::*;
    use chrono::Utc;

    #[test]
    fn strategy_state_transitions_follow_apply_abort_delete_lanes() {
        assert!(StrategyState::Initial.can_transition_to(StrategyState::Applying));
        assert!(StrategyState::Applying.can_transition_to(StrategyState::AbortRequested));
        assert!(StrategyState::AbortRequested.can_transition_to(StrategyState::Aborting));
        assert!(StrategyState::Aborting.can_transition_to(StrategyState::Aborted));
        assert!(StrategyState::Complete.can_transition_to(StrategyState::Deleting));
        assert!(!StrategyState::Initial.can_transition_to(StrategyState::Complete));
        assert!(!StrategyState::Deleting.can_transition_to(StrategyState::Applying));
    }

    #[test]
    fn strategy_terminal_states_are_complete_failed_aborted() {
        assert!(StrategyState::Complete.is_terminal());
        assert!(StrategyState::Failed.is_terminal());
        assert!(StrategyState::Aborted.is_terminal());
        assert!(!StrategyState::Applying.is_terminal());
        assert!(!StrategyState::Deleting.is_terminal());
    }

    #[test]
    fn strategy_transition_rejects_invalid_move() {
        let mut strat = sample_strategy();
        let err = strat.transition(StrategyState::Complete).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStrategyTransition { .. }));
        assert_eq!(strat.state, StrategyState::Initial);
    }

    #[test]
    fn strategy_transition_accepts_valid_move() {
        let mut strat = sample_strategy();
        strat.transition(StrategyState::Applying).unwrap();
        assert_eq!(strat.state, StrategyState::Applying);
    }

    #[test]
    fn step_terminal_states_set_finished_at_and_started_at_is_sticky() {
        let now = Utc::now();
        let mut step = StrategyStep::new(Some(SubcloudId(7)), 2);
        assert!(step.started_at.is_none());

        step.apply_transition(StepState::UpdatingPatches, "starting", now);
        assert_eq!(step.started_at, Some(now));
        assert!(step.finished_at.is_none());

        let later = now + chrono::Duration::seconds(30);
        step.apply_transition(StepState::Complete, "done", later);
        assert_eq!(step.started_at, Some(now), "started_at must not move once set");
        assert_eq!(step.finished_at, Some(later));
        assert!(step.state.is_terminal());
    }

    #[test]
    fn system_controller_step_has_no_subcloud_id_and_keys_on_virtual_master_cloud() {
        let step = StrategyStep::new(None, 1);
        assert!(step.is_system_controller());
        assert_eq!(step.region_key(None), VIRTUAL_MASTER_CLOUD);
    }

    #[test]
    fn subcloud_step_keys_on_its_own_name() {
        let step = StrategyStep::new(Some(SubcloudId(3)), 2);
        assert!(!step.is_system_controller());
        assert_eq!(step.region_key(Some("subcloud3")), "subcloud3");
    }

    #[test]
    fn orch_request_try_count_never_exceeds_max_retry() {
        let now = Utc::now();
        let mut req = OrchRequest::new(
            SubcloudId(1),
            EndpointType::Identity,
            "keypair",
            "src-1",
            Operation::Create,
            now,
        );
        for _ in 0..(MAX_RETRY + 5) {
            req.bump_try_count(now);
        }
        assert_eq!(req.try_count, MAX_RETRY);
    }

    #[test]
    fn orch_request_starts_queued() {
        let now = Utc::now();
        let req = OrchRequest::new(
            SubcloudId(1),
            EndpointType::Identity,
            "keypair",
            "src-1",
            Operation::Create,
            now,
        );
        assert_eq!(req.state, OrchRequestState::Queued);
        assert_eq!(req.try_count, 0);
    }

    #[test]
    fn apply_type_parses_from_str() {
        assert_eq!("serial".parse::<ApplyType>().unwrap(), ApplyType::Serial);
        assert_eq!("parallel".parse::<ApplyType>().unwrap(), ApplyType::Parallel);
        assert!(matches!(
            "bogus".parse::<ApplyType>(),
            Err(DomainError::InvalidApplyType)
        ));
    }

    #[test]
    fn endpoint_type_openstack_membership() {
        assert!(EndpointType::OpenstackCompute.is_openstack());
        assert!(EndpointType::OpenstackNetwork.is_openstack());
        assert!(EndpointType::OpenstackVolume.is_openstack());
        assert!(!EndpointType::Identity.is_openstack());
        assert!(!EndpointType::Patching.is_openstack());
    }

    fn sample_strategy() -> SwUpdateStrategy {
        let now = Utc::now();
        SwUpdateStrategy {
            strategy_type: StrategyType::Patch,
            subcloud_apply_type: ApplyType::Parallel,
            max_parallel_subclouds: 2,
            stop_on_failure: true,
            state: StrategyState::Initial,
            extra_args: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }
}
