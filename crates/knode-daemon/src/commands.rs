//! The line-oriented command channel: `put`, `get`, `ping`, `print_id`,
//! `exit`. Each command produces a single reply line; unknown commands
//! reply `"Invalid command"`.

use knode_dht::node::Node;
use knode_types::NodeId;

/// The result of handling one input line.
pub enum Outcome {
    /// Print this line and keep reading.
    Reply(String),
    /// Print this line and stop reading (the `exit` command).
    Exit(String),
}

/// Parse and run a single command line against `node`.
pub async fn handle_line(node: &Node, line: &str) -> Outcome {
    let mut parts = line.trim().splitn(3, ' ');
    match parts.next().unwrap_or("") {
        "put" => {
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                return Outcome::Reply("Invalid command".to_string());
            };
            match node.send_store(key, value.as_bytes().to_vec()).await {
                Ok(message) => Outcome::Reply(message),
                Err(e) => Outcome::Reply(format!("Error: {e}")),
            }
        }
        "get" => {
            let Some(key) = parts.next() else {
                return Outcome::Reply("Invalid command".to_string());
            };
            match node.send_find_value(key).await {
                Ok(value) => Outcome::Reply(String::from_utf8_lossy(&value).into_owned()),
                Err(e) => Outcome::Reply(format!("Error: {e}")),
            }
        }
        "ping" => {
            let Some(id_hex) = parts.next() else {
                return Outcome::Reply("Invalid command".to_string());
            };
            match NodeId::from_hex(id_hex) {
                Ok(id) => match node.send_ping(id).await {
                    Ok(message) => Outcome::Reply(message),
                    Err(e) => Outcome::Reply(format!("Error: {e}")),
                },
                Err(_) => Outcome::Reply("Invalid command".to_string()),
            }
        }
        "print_id" => Outcome::Reply(node.print_id()),
        "exit" => Outcome::Exit("Bye".to_string()),
        _ => Outcome::Reply("Invalid command".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knode_dht::node::NodeState;
    use std::net::{IpAddr, Ipv4Addr};

    async fn make_node() -> Node {
        let state = NodeState::bind(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            0,
            "127.0.0.1",
            NodeId::random(),
        )
        .await
        .expect("bind");
        Node::new(state)
    }

    #[tokio::test]
    async fn print_id_echoes_the_node_id() {
        let node = make_node().await;
        match handle_line(&node, "print_id").await {
            Outcome::Reply(line) => assert_eq!(line, node.print_id()),
            Outcome::Exit(_) => panic!("expected a reply"),
        }
    }

    #[tokio::test]
    async fn unknown_command_is_invalid() {
        let node = make_node().await;
        match handle_line(&node, "frobnicate").await {
            Outcome::Reply(line) => assert_eq!(line, "Invalid command"),
            Outcome::Exit(_) => panic!("expected a reply"),
        }
    }

    #[tokio::test]
    async fn exit_terminates_the_loop() {
        let node = make_node().await;
        match handle_line(&node, "exit").await {
            Outcome::Exit(_) => {}
            Outcome::Reply(_) => panic!("expected exit"),
        }
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let node = make_node().await;
        let put_reply = handle_line(&node, "put key value").await;
        match put_reply {
            Outcome::Reply(line) => assert_eq!(line, "Value has been stored in the network"),
            Outcome::Exit(_) => panic!("expected a reply"),
        }

        let get_reply = handle_line(&node, "get key").await;
        match get_reply {
            Outcome::Reply(line) => assert_eq!(line, "value"),
            Outcome::Exit(_) => panic!("expected a reply"),
        }
    }

    #[tokio::test]
    async fn ping_self_by_id() {
        let node = make_node().await;
        let id_hex = node.print_id();
        let line = format!("ping {id_hex}");
        match handle_line(&node, &line).await {
            Outcome::Reply(reply) => {
                assert_eq!(reply, format!("Ping response from {id_hex}"))
            }
            Outcome::Exit(_) => panic!("expected a reply"),
        }
    }

    #[tokio::test]
    async fn malformed_ping_id_is_invalid() {
        let node = make_node().await;
        match handle_line(&node, "ping not-hex").await {
            Outcome::Reply(line) => assert_eq!(line, "Invalid command"),
            Outcome::Exit(_) => panic!("expected a reply"),
        }
    }
}
