//! Channel mode enforcement: moderation, bans, keys, limits, invites,
//! topic lock, and mode queries.

mod common;

use std::time::Duration;

use common::TestServer;

#[tokio::test]
async fn moderated_channel_silences_the_voiceless() {
    let server = TestServer::spawn().await.expect("spawn");
    let mut alice = server.client("alice").await.expect("alice");
    let mut bob = server.client("bob").await.expect("bob");

    alice.join("#room").await.unwrap();
    bob.join("#room").await.unwrap();
    alice.send_raw("MODE #room +m").await.unwrap();
    alice.drain().await;
    bob.drain().await;

    bob.privmsg("#room", "hi").await.unwrap();
    let reply = bob.recv().await.unwrap();
    assert_eq!(reply.command, "404");
    assert_eq!(reply.params[1], "#room");
    // No broadcast happened.
    assert!(alice
        .recv_timeout(Duration::from_millis(200))
        .await
        .is_err());

    // Voice lets him through.
    alice.send_raw("MODE #room +v bob").await.unwrap();
    bob.recv_until(|m| m.command == "MODE").await.unwrap();
    bob.privmsg("#room", "hi again").await.unwrap();
    let seen = alice.recv_until(|m| m.command == "PRIVMSG").await.unwrap();
    assert_eq!(seen.last().unwrap().params[1], "hi again");
}

#[tokio::test]
async fn bans_block_joins_and_excepts_override() {
    let server = TestServer::spawn().await.expect("spawn");
    let mut alice = server.client("alice").await.expect("alice");
    let mut bob = server.client("bob").await.expect("bob");

    alice.join("#room").await.unwrap();
    alice.send_raw("MODE #room +b bob!*@*").await.unwrap();
    alice.drain().await;

    let rejected = bob.join("#room").await.unwrap();
    assert_eq!(rejected.last().unwrap().command, "474");

    alice.send_raw("MODE #room +e bob!*@*").await.unwrap();
    alice.drain().await;
    let burst = bob.join("#room").await.unwrap();
    assert!(burst.iter().any(|m| m.command == "366"));
}

#[tokio::test]
async fn ban_list_query_and_mask_expansion() {
    let server = TestServer::spawn().await.expect("spawn");
    let mut alice = server.client("alice").await.expect("alice");

    alice.join("#room").await.unwrap();
    // A bare nick expands to nick!*@* before joining the ban set.
    alice.send_raw("MODE #room +b troll").await.unwrap();
    alice.drain().await;

    alice.send_raw("MODE #room +b").await.unwrap();
    let listing = alice.recv_until(|m| m.command == "368").await.unwrap();
    let entry = listing.iter().find(|m| m.command == "367").unwrap();
    assert_eq!(entry.params[2], "troll!*@*");
}

#[tokio::test]
async fn channel_key_and_limit() {
    let server = TestServer::spawn().await.expect("spawn");
    let mut alice = server.client("alice").await.expect("alice");
    let mut bob = server.client("bob").await.expect("bob");
    let mut carol = server.client("carol").await.expect("carol");

    alice.join("#room").await.unwrap();
    alice.send_raw("MODE #room +k sesame").await.unwrap();
    alice.drain().await;

    let rejected = bob.join("#room").await.unwrap();
    assert_eq!(rejected.last().unwrap().command, "475");
    bob.send_raw("JOIN #room sesame").await.unwrap();
    bob.recv_until(|m| m.command == "366").await.unwrap();

    // Limit of 2 keeps carol out, key or not.
    alice.send_raw("MODE #room +l 2").await.unwrap();
    alice.drain().await;
    carol.send_raw("JOIN #room sesame").await.unwrap();
    let reply = carol.recv().await.unwrap();
    assert_eq!(reply.command, "471");
}

#[tokio::test]
async fn invite_only_flow() {
    let server = TestServer::spawn().await.expect("spawn");
    let mut alice = server.client("alice").await.expect("alice");
    let mut bob = server.client("bob").await.expect("bob");

    alice.join("#room").await.unwrap();
    alice.send_raw("MODE #room +i").await.unwrap();
    alice.drain().await;

    let rejected = bob.join("#room").await.unwrap();
    assert_eq!(rejected.last().unwrap().command, "473");

    alice.send_raw("INVITE bob #room").await.unwrap();
    let confirm = alice.recv().await.unwrap();
    assert_eq!(confirm.command, "341");
    let invite = bob.recv().await.unwrap();
    assert_eq!(invite.command, "INVITE");
    assert_eq!(invite.params, vec!["bob", "#room"]);

    let burst = bob.join("#room").await.unwrap();
    assert!(burst.iter().any(|m| m.command == "366"));
}

#[tokio::test]
async fn topic_lock_requires_ops() {
    let server = TestServer::spawn().await.expect("spawn");
    let mut alice = server.client("alice").await.expect("alice");
    let mut bob = server.client("bob").await.expect("bob");

    alice.join("#room").await.unwrap();
    bob.join("#room").await.unwrap();
    alice.send_raw("MODE #room +t").await.unwrap();
    alice.drain().await;
    bob.drain().await;

    bob.send_raw("TOPIC #room :mine now").await.unwrap();
    assert_eq!(bob.recv().await.unwrap().command, "482");

    alice.send_raw("MODE #room +o bob").await.unwrap();
    bob.recv_until(|m| m.command == "MODE").await.unwrap();
    bob.send_raw("TOPIC #room :ours now").await.unwrap();
    let seen = bob.recv_until(|m| m.command == "TOPIC").await.unwrap();
    assert_eq!(seen.last().unwrap().params[1], "ours now");
}

#[tokio::test]
async fn mode_query_and_unknown_mode() {
    let server = TestServer::spawn().await.expect("spawn");
    let mut alice = server.client("alice").await.expect("alice");

    alice.join("#room").await.unwrap();
    alice.send_raw("MODE #room +kin sesame").await.unwrap();
    alice.drain().await;

    alice.send_raw("MODE #room").await.unwrap();
    let reply = alice.recv().await.unwrap();
    assert_eq!(reply.command, "324");
    assert_eq!(reply.params[1], "#room");
    let flags = &reply.params[2];
    assert!(flags.contains('i') && flags.contains('n') && flags.contains('k'));
    // Members see the key parameter.
    assert!(reply.params[3..].contains(&"sesame".to_string()));

    alice.send_raw("MODE #room +x").await.unwrap();
    let reply = alice.recv().await.unwrap();
    assert_eq!(reply.command, "472");
}

#[tokio::test]
async fn secret_channels_hide_from_list() {
    let server = TestServer::spawn().await.expect("spawn");
    let mut alice = server.client("alice").await.expect("alice");
    let mut bob = server.client("bob").await.expect("bob");

    alice.join("#open").await.unwrap();
    alice.join("#hidden").await.unwrap();
    alice.send_raw("MODE #hidden +s").await.unwrap();
    alice.drain().await;

    bob.send_raw("LIST").await.unwrap();
    let listing = bob.recv_until(|m| m.command == "323").await.unwrap();
    let channels: Vec<&str> = listing
        .iter()
        .filter(|m| m.command == "322")
        .map(|m| m.params[1].as_str())
        .collect();
    assert!(channels.contains(&"#open"));
    assert!(!channels.contains(&"#hidden"));

    // Members still see it.
    alice.send_raw("LIST").await.unwrap();
    let listing = alice.recv_until(|m| m.command == "323").await.unwrap();
    assert!(listing
        .iter()
        .any(|m| m.command == "322" && m.params[1] == "#hidden"));
}

#[tokio::test]
async fn user_modes_roundtrip() {
    let server = TestServer::spawn().await.expect("spawn");
    let mut alice = server.client("alice").await.expect("alice");

    alice.send_raw("MODE alice +iw").await.unwrap();
    let echo = alice.recv().await.unwrap();
    assert_eq!(echo.command, "MODE");
    assert_eq!(echo.params, vec!["alice", "+iw"]);

    alice.send_raw("MODE alice").await.unwrap();
    let reply = alice.recv().await.unwrap();
    assert_eq!(reply.command, "221");
    assert!(reply.params[1].contains('i') && reply.params[1].contains('w'));

    // Nobody grants themselves +o.
    alice.send_raw("MODE alice +o").await.unwrap();
    alice.send_raw("MODE alice").await.unwrap();
    let reply = alice.recv_until(|m| m.command == "221").await.unwrap();
    assert!(!reply.last().unwrap().params[1].contains('o'));

    // Other users' modes are off limits.
    let _bob = server.client("bob").await.expect("bob");
    alice.send_raw("MODE bob +i").await.unwrap();
    let reply = alice.recv().await.unwrap();
    assert_eq!(reply.command, "502");
}
