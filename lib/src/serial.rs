//! Strictly sequential async execution.

/// Runs `op` over `items` one at a time, in order.
///
/// The n-th invocation starts only after the (n-1)-th future resolved `Ok`,
/// and results come back in input order. The first error aborts the chain;
/// no further items are processed.
///
/// Creation order must match template order exactly for metadata indices to
/// stay meaningful, so the importer never runs these operations
/// concurrently: index-based references would race.
pub async fn run_serially<T, R, E, F>(
    items: impl IntoIterator<Item = T>,
    mut op: F,
) -> Result<Vec<R>, E>
where
    F: AsyncFnMut(T) -> Result<R, E>,
{
    let mut results = Vec::new();
    for item in items {
        results.push(op(item).await?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn invocations_run_one_after_another_and_keep_input_order() {
        let events = RefCell::new(Vec::new());

        // Later items sleep less, so a concurrent runner would finish them
        // out of order. A serial runner must still interleave start/end
        // pairs and return results in input order.
        let results = run_serially([1u64, 2, 3], async |item| {
            events.borrow_mut().push(format!("start {item}"));
            tokio::time::sleep(Duration::from_millis(40 / item)).await;
            events.borrow_mut().push(format!("end {item}"));
            Ok::<_, String>(item * 10)
        })
        .await
        .unwrap();

        assert_eq!(results, vec![10, 20, 30]);
        assert_eq!(
            events.into_inner(),
            vec!["start 1", "end 1", "start 2", "end 2", "start 3", "end 3"]
        );
    }

    #[tokio::test]
    async fn first_error_stops_the_chain() {
        let invoked = RefCell::new(Vec::new());

        let result = run_serially([1u64, 2, 3], async |item| {
            invoked.borrow_mut().push(item);
            if item == 2 {
                Err("boom")
            } else {
                Ok(item)
            }
        })
        .await;

        assert_eq!(result, Err("boom"));
        assert_eq!(invoked.into_inner(), vec![1, 2]);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_results() {
        let results = run_serially(Vec::<u64>::new(), async |item| Ok::<_, String>(item))
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
