//! Integration tests for the execution engine

#[cfg(test)]
mod tests {
    use shardex_engine::*;
    use shardex_errors::{DataAccessError, DataAccessKind, Error, EventError, ExecutionError, UnitError};
    use shardex_events::{
        EngineEvent, EventBus, EventListener, EventMessage, ExecutionEvent, ExecutionStage,
        OperationEvent,
    };
    use shardex_resources::{PoolLimits, WorkerPool};
    use shardex_types::{ExecutionUnit, ParameterSet, SqlType, SqlUnit};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EngineEvent>>);

    impl EventListener for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn on_event(&self, message: &EventMessage) -> Result<(), EventError> {
            self.0.lock().unwrap().push(message.event.clone());
            Ok(())
        }
    }

    impl Recorder {
        fn unit_events(&self) -> Vec<ExecutionEvent> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter_map(|event| match event {
                    EngineEvent::Unit(unit) => Some(unit.clone()),
                    EngineEvent::Operation(_) => None,
                })
                .collect()
        }

        fn operation_events(&self) -> Vec<OperationEvent> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter_map(|event| match event {
                    EngineEvent::Operation(operation) => Some(operation.clone()),
                    EngineEvent::Unit(_) => None,
                })
                .collect()
        }

        async fn wait_for_terminal(&self, expected: usize) {
            for _ in 0..200 {
                let terminal = self
                    .unit_events()
                    .iter()
                    .filter(|event| event.is_terminal())
                    .count();
                if terminal >= expected {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("timed out waiting for {expected} terminal events");
        }
    }

    fn engine(limits: PoolLimits) -> (ExecutorEngine, Arc<Recorder>) {
        let bus = Arc::new(EventBus::new());
        let recorder = Arc::new(Recorder::default());
        bus.subscribe(recorder.clone());
        (ExecutorEngine::new(WorkerPool::new(limits), bus), recorder)
    }

    fn units(count: usize) -> Vec<ExecutionUnit> {
        (0..count)
            .map(|i| {
                ExecutionUnit::new(
                    format!("ds_{i}"),
                    SqlUnit::new(
                        "SELECT * FROM t_order WHERE user_id = ?",
                        vec![ParameterSet::new(vec![10.into()])],
                    ),
                )
            })
            .collect()
    }

    fn refused(unit: &ExecutionUnit) -> UnitError {
        DataAccessError::new(unit.data_source(), DataAccessKind::Connectivity, "connection refused")
            .into()
    }

    /// Returns "<data source>:ok", failing the listed data sources.
    fn shard_executor(failing: &'static [&'static str]) -> Arc<impl UnitExecutor<String>> {
        Arc::new(move |unit: Arc<ExecutionUnit>| async move {
            if failing.contains(&unit.data_source()) {
                Err(refused(&unit))
            } else {
                Ok(format!("{}:ok", unit.data_source()))
            }
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_all_units_succeed_lenient() {
        let (engine, recorder) = engine(PoolLimits::for_testing());

        let results = engine
            .run_all(
                SqlType::Dql,
                units(3),
                ExecutionContext::new(false),
                shard_executor(&[]),
            )
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![
                ExecutionResult::Present("ds_0:ok".to_string()),
                ExecutionResult::Present("ds_1:ok".to_string()),
                ExecutionResult::Present("ds_2:ok".to_string()),
            ]
        );

        let events = recorder.unit_events();
        assert_eq!(events.len(), 6);
        let started = events
            .iter()
            .filter(|e| matches!(e.stage, ExecutionStage::Started))
            .count();
        let succeeded = events
            .iter()
            .filter(|e| matches!(e.stage, ExecutionStage::Succeeded))
            .count();
        assert_eq!((started, succeeded), (3, 3));

        let operations = recorder.operation_events();
        assert!(matches!(operations[0], OperationEvent::Started { units: 3, strict: false, .. }));
        assert!(matches!(operations[1], OperationEvent::Completed { present: 3, absent: 0, .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lenient_failure_yields_absent() {
        let (engine, recorder) = engine(PoolLimits::for_testing());

        let results = engine
            .run_all(
                SqlType::Dql,
                units(3),
                ExecutionContext::new(false),
                shard_executor(&["ds_1"]),
            )
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![
                ExecutionResult::Present("ds_0:ok".to_string()),
                ExecutionResult::Absent,
                ExecutionResult::Present("ds_2:ok".to_string()),
            ]
        );

        let failed: Vec<_> = recorder
            .unit_events()
            .into_iter()
            .filter(ExecutionEvent::is_failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].data_source, "ds_1");
        let ExecutionStage::Failed { failure } = &failed[0].stage else {
            unreachable!()
        };
        assert_eq!(failure.code.as_deref(), Some("data_access.connectivity"));
        assert!(failure.retryable);

        assert!(matches!(
            recorder.operation_events()[1],
            OperationEvent::Completed { present: 2, absent: 1, .. }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_strict_failure_aborts_but_siblings_finish() {
        let (engine, recorder) = engine(PoolLimits::for_testing());
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();
        let executor = Arc::new(move |unit: Arc<ExecutionUnit>| {
            let counter = counter.clone();
            async move {
                if unit.data_source() == "ds_2" {
                    return Err(refused(&unit));
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(unit.data_source().to_string())
            }
        });

        let err = engine
            .run_all(SqlType::Dml, units(3), ExecutionContext::new(true), executor)
            .await
            .unwrap_err();

        match err {
            Error::Execution(ExecutionError::UnitFailed {
                index, data_source, ..
            }) => {
                assert_eq!(index, 2);
                assert_eq!(data_source, "ds_2");
            }
            other => panic!("unexpected error: {other}"),
        }

        // Detached siblings still run to completion and publish their events.
        recorder.wait_for_terminal(3).await;
        assert_eq!(finished.load(Ordering::SeqCst), 2);
        assert_eq!(recorder.unit_events().len(), 6);
        assert!(matches!(
            recorder.operation_events()[1],
            OperationEvent::Failed { .. }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_single_unit_matches_pooled_events() {
        let (engine, recorder) = engine(PoolLimits::for_testing());

        let results = engine
            .run_all(
                SqlType::Dql,
                units(1),
                ExecutionContext::new(true),
                shard_executor(&[]),
            )
            .await
            .unwrap();
        assert_eq!(results, vec![ExecutionResult::Present("ds_0:ok".to_string())]);

        let events = recorder.unit_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].stage, ExecutionStage::Started));
        assert!(matches!(events[1].stage, ExecutionStage::Succeeded));
        assert_eq!(events[0].id, events[1].id);

        let err = engine
            .run_all(
                SqlType::Dql,
                units(1),
                ExecutionContext::new(true),
                shard_executor(&["ds_0"]),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_execution(),
            Some(ExecutionError::UnitFailed { index: 0, .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_events_per_parameter_set() {
        let (engine, recorder) = engine(PoolLimits::for_testing());
        let batch = |ds: &str| {
            ExecutionUnit::new(
                ds,
                SqlUnit::new(
                    "INSERT INTO t_order (order_id, status) VALUES (?, ?)",
                    vec![
                        ParameterSet::new(vec![1.into(), "init".into()]),
                        ParameterSet::new(vec![2.into(), "init".into()]),
                        ParameterSet::new(vec![3.into(), "init".into()]),
                    ],
                ),
            )
        };

        engine
            .run_all(
                SqlType::Dml,
                vec![batch("ds_0"), batch("ds_1")],
                ExecutionContext::new(false),
                shard_executor(&["ds_1"]),
            )
            .await
            .unwrap();

        let events = recorder.unit_events();
        assert_eq!(events.len(), 12);
        for ds in ["ds_0", "ds_1"] {
            let per_unit: Vec<_> = events.iter().filter(|e| e.data_source == ds).collect();
            assert_eq!(per_unit.len(), 6);
            assert!(per_unit[..3]
                .iter()
                .all(|e| matches!(e.stage, ExecutionStage::Started)));
            assert!(per_unit[3..].iter().all(|e| e.is_terminal()));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_results_follow_input_order() {
        let (engine, _) = engine(PoolLimits::new(8));
        let executor = Arc::new(|unit: Arc<ExecutionUnit>| async move {
            let index: u64 = unit.data_source()[3..].parse().unwrap();
            // Later units finish first.
            tokio::time::sleep(Duration::from_millis(10 * (6 - index))).await;
            Ok::<_, UnitError>(index)
        });

        let results = engine
            .run_all(SqlType::Dql, units(6), ExecutionContext::new(true), executor)
            .await
            .unwrap();

        let values: Vec<_> = results
            .into_iter()
            .map(ExecutionResult::into_option)
            .collect();
        assert_eq!(values, (0..6).map(Some).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_operations_keep_their_own_context() {
        let (engine, _) = engine(PoolLimits::new(8));
        let executor = Arc::new(|_unit: Arc<ExecutionUnit>| async {
            tokio::task::yield_now().await;
            let tag = current_diagnostics()
                .get("operation")
                .and_then(|v| v.as_str().map(str::to_string));
            Ok::<_, UnitError>((current_strict_mode(), tag))
        });

        let strict = ExecutionContext::new(true).with_diagnostic("operation", "a");
        let lenient = ExecutionContext::new(false).with_diagnostic("operation", "b");
        let (a, b) = tokio::join!(
            engine.run_all(SqlType::Dql, units(4), strict, executor.clone()),
            engine.run_all(SqlType::Dql, units(4), lenient, executor.clone()),
        );

        for result in a.unwrap() {
            assert_eq!(result, ExecutionResult::Present((true, Some("a".to_string()))));
        }
        for result in b.unwrap() {
            assert_eq!(result, ExecutionResult::Present((false, Some("b".to_string()))));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_bounds_concurrency() {
        let (engine, _) = engine(PoolLimits::new(2));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (active_in, peak_in) = (active.clone(), peak.clone());
        let executor = Arc::new(move |_unit: Arc<ExecutionUnit>| {
            let (active, peak) = (active_in.clone(), peak_in.clone());
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, UnitError>(())
            }
        });

        let results = engine
            .run_all(SqlType::Dml, units(8), ExecutionContext::new(true), executor)
            .await
            .unwrap();

        assert_eq!(results.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(active.load(Ordering::SeqCst), 0);
        assert!(engine.pool().availability().all_idle(&engine.pool().limits()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_data_source_limit_bounds_concurrency() {
        let (engine, _) = engine(PoolLimits::new(8).with_connections_per_data_source(1));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (active_in, peak_in) = (active.clone(), peak.clone());
        let executor = Arc::new(move |_unit: Arc<ExecutionUnit>| {
            let (active, peak) = (active_in.clone(), peak_in.clone());
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, UnitError>(())
            }
        });

        let same_source: Vec<_> = (0..4)
            .map(|_| ExecutionUnit::new("ds_0", SqlUnit::new("DELETE FROM t_order", vec![])))
            .collect();
        engine
            .run_all(SqlType::Dml, same_source, ExecutionContext::new(true), executor)
            .await
            .unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_contract_failure_propagates_in_lenient_mode() {
        let (engine, _) = engine(PoolLimits::for_testing());
        let executor = Arc::new(|unit: Arc<ExecutionUnit>| async move {
            if unit.data_source() == "ds_2" {
                Err(UnitError::contract("parameter count does not match placeholders"))
            } else {
                Ok(())
            }
        });

        let err = engine
            .run_all(SqlType::Dml, units(3), ExecutionContext::new(false), executor)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_execution(),
            Some(ExecutionError::Contract { index: 2, .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_panic_propagates_in_lenient_mode() {
        let (engine, recorder) = engine(PoolLimits::for_testing());
        let executor = Arc::new(|unit: Arc<ExecutionUnit>| async move {
            assert_ne!(unit.data_source(), "ds_1", "driver bug");
            Ok::<_, UnitError>(())
        });

        let err = engine
            .run_all(SqlType::Dql, units(2), ExecutionContext::new(false), executor)
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_execution(),
            Some(ExecutionError::WorkerPanicked { index: 1, .. })
        ));

        recorder.wait_for_terminal(2).await;
        let failed = recorder
            .unit_events()
            .into_iter()
            .filter(ExecutionEvent::is_failed)
            .count();
        assert_eq!(failed, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_timeout_abandons_wait() {
        let (engine, recorder) = engine(PoolLimits::for_testing());
        let executor = Arc::new(|_unit: Arc<ExecutionUnit>| async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok::<_, UnitError>(())
        });

        let err = engine
            .run_all_with_timeout(
                SqlType::Dql,
                units(2),
                ExecutionContext::new(true),
                executor,
                Duration::from_millis(30),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_execution(),
            Some(ExecutionError::Timeout { deadline_ms: 30 })
        ));

        // The workers were not interrupted.
        recorder.wait_for_terminal(2).await;
        assert!(recorder
            .unit_events()
            .iter()
            .filter(|e| e.is_terminal())
            .all(|e| matches!(e.stage, ExecutionStage::Succeeded)));

        // The abandoned operation finishing later publishes nothing further.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let operations = recorder.operation_events();
        assert_eq!(operations.len(), 2);
        assert!(matches!(operations[0], OperationEvent::Started { .. }));
        assert!(matches!(operations[1], OperationEvent::Failed { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_operation_finishing_before_deadline_completes_once() {
        let (engine, recorder) = engine(PoolLimits::for_testing());

        let results = engine
            .run_all_with_timeout(
                SqlType::Dql,
                units(2),
                ExecutionContext::new(true),
                shard_executor(&[]),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 2);

        let operations = recorder.operation_events();
        assert_eq!(operations.len(), 2);
        assert!(matches!(
            operations[1],
            OperationEvent::Completed {
                present: 2,
                absent: 0,
                ..
            }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_strict_failure_surfaces_while_units_are_queued() {
        let (engine, recorder) = engine(PoolLimits::new(1));
        let executor = Arc::new(|unit: Arc<ExecutionUnit>| async move {
            if unit.data_source() == "ds_0" {
                return Err(refused(&unit));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        });

        let started = tokio::time::Instant::now();
        let err = engine
            .run_all(SqlType::Dml, units(5), ExecutionContext::new(true), executor)
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(
            err.as_execution(),
            Some(ExecutionError::UnitFailed { index: 0, .. })
        ));
        assert!(
            elapsed < Duration::from_millis(90),
            "failure surfaced after {elapsed:?}"
        );

        // Units still queued behind the saturated pool are never dispatched.
        tokio::time::sleep(Duration::from_millis(250)).await;
        let dispatched = recorder
            .unit_events()
            .iter()
            .filter(|e| matches!(e.stage, ExecutionStage::Started))
            .count();
        assert!(dispatched <= 2, "{dispatched} units dispatched");
        assert!(engine.pool().availability().all_idle(&engine.pool().limits()));
    }

    #[tokio::test]
    async fn test_empty_operation_publishes_nothing() {
        let (engine, recorder) = engine(PoolLimits::for_testing());
        let results = engine
            .run_all(
                SqlType::Dql,
                Vec::new(),
                ExecutionContext::default(),
                shard_executor(&[]),
            )
            .await
            .unwrap();
        assert!(results.is_empty());
        assert!(recorder.0.lock().unwrap().is_empty());
    }
}
