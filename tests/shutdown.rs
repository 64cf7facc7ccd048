//! Lifecycle behavior: stop, wait, and termination of live subscriptions.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use querybus::{
    Event, Query, Server, ServerConfig, ServerError, SubscribeArgs, SubscriptionError,
};

const BOUND: Duration = Duration::from_secs(1);

#[tokio::test]
async fn shutdown_terminates_live_subscriptions() {
    let server: Arc<Server<String>> = Server::new(ServerConfig::default());
    server.start().unwrap();
    let ctx = CancellationToken::new();

    let sub = server
        .subscribe_with_args(SubscribeArgs::new("client", Query::match_all()).with_limit(4))
        .await
        .unwrap();

    // A consumer already waiting when stop arrives.
    let pending = {
        let sub = Arc::clone(&sub);
        tokio::spawn(async move {
            let ctx = CancellationToken::new();
            sub.next(&ctx).await
        })
    };
    tokio::task::yield_now().await;

    server.stop();
    timeout(BOUND, server.wait()).await.unwrap();

    assert_eq!(
        pending.await.unwrap(),
        Err(SubscriptionError::Terminated)
    );
    assert_eq!(
        timeout(BOUND, sub.next(&ctx)).await.unwrap(),
        Err(SubscriptionError::Terminated)
    );
    assert_eq!(
        server.publish(&ctx, "late".to_string()).await,
        Err(ServerError::Stopped)
    );
    assert_eq!(
        server
            .subscribe("client", Query::match_all())
            .await
            .unwrap_err(),
        ServerError::Stopped
    );
    assert_eq!(server.num_clients().await, 0);
}

#[tokio::test]
async fn stop_is_idempotent_across_tasks() {
    let server: Arc<Server<String>> = Server::new(ServerConfig::default());
    server.start().unwrap();

    let stoppers: Vec<_> = (0..4)
        .map(|_| {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server.stop();
                server.wait().await;
            })
        })
        .collect();

    for s in stoppers {
        timeout(BOUND, s).await.unwrap().unwrap();
    }
    timeout(BOUND, server.wait()).await.unwrap();
}

#[tokio::test]
async fn accepted_messages_are_fanned_out_before_exit() {
    // A buffered channel lets publishers run ahead; the sender drains what
    // was accepted before terminating subscriptions, and wait() only
    // returns after that. Whether a consumer can still read buffered
    // messages after termination is unspecified, so this only bounds it.
    let server: Arc<Server<String>> = Server::new(ServerConfig { buffer_capacity: 8 });
    server.start().unwrap();
    let ctx = CancellationToken::new();

    let sub = server
        .subscribe_with_args(SubscribeArgs::new("client", Query::match_all()).with_limit(8))
        .await
        .unwrap();

    for n in 0..5 {
        server
            .publish_with_events(
                &ctx,
                format!("m{n}"),
                vec![Event::new("k").with_attribute("n", n.to_string())],
            )
            .await
            .unwrap();
    }

    server.stop();
    timeout(BOUND, server.wait()).await.unwrap();

    // Everything accepted before stop was fanned out; the subscription was
    // then terminated. Drain until the terminal error and count.
    let mut seen = 0;
    let err = loop {
        match timeout(BOUND, sub.next(&ctx)).await.unwrap() {
            Ok(_) => seen += 1,
            Err(err) => break err,
        }
    };
    assert_eq!(err, SubscriptionError::Terminated);
    assert!(seen <= 5);
}

#[tokio::test]
async fn stop_without_start_releases_waiters() {
    let server: Arc<Server<String>> = Server::new(ServerConfig::default());
    server.stop();
    timeout(BOUND, server.wait()).await.unwrap();

    assert_eq!(server.start().unwrap_err(), ServerError::Stopped);
}

#[tokio::test]
async fn publisher_blocked_on_full_channel_observes_stop() {
    // Unbuffered server with no consumer draining: the second publish
    // suspends in the enqueue until stop aborts it.
    let server: Arc<Server<String>> = Server::new(ServerConfig::default());
    server.start().unwrap();
    let ctx = CancellationToken::new();

    // No subscriptions: the sender drains items immediately, so saturate
    // faster than it drains by publishing from a task while stopping.
    let publisher = {
        let server = Arc::clone(&server);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let mut n = 0u64;
            loop {
                if server.publish(&ctx, format!("m{n}")).await.is_err() {
                    return;
                }
                n += 1;
            }
        })
    };

    tokio::task::yield_now().await;
    server.stop();
    timeout(BOUND, server.wait()).await.unwrap();

    // The publisher task exits on the first Stopped error.
    timeout(BOUND, publisher).await.unwrap().unwrap();
}
