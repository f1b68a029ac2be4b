//! PEX sessions against a hand-driven peer over real TCP.

use std::{collections::BTreeSet, net::SocketAddr, sync::Arc, time::Duration};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use seeder_net_addrbook::FileAddressBook;
use seeder_net_pex::{PexConfig, PexMessage, PexService};
use seeder_net_switch::{Switch, SwitchConfig, TcpTransport, frame};
use seeder_node_api::{
    AddressBook, AddressStore, ChannelId, ConnectionManager, NodeDescriptor, NodeId, PEX_CHANNEL,
    PeerAddr, ProtocolVersion, Transport,
};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

const NETWORK: &str = "pex-test";
const WAIT: Duration = Duration::from_secs(5);

fn descriptor(id: u8, listen_addr: SocketAddr) -> NodeDescriptor {
    NodeDescriptor {
        node_id: NodeId::new([id; 20].into()),
        network: NETWORK.to_string(),
        protocol: ProtocolVersion::new(8, 11, 0),
        listen_addr,
        channels: vec![PEX_CHANNEL],
        moniker: "fake".to_string(),
        version: "0.0.0".to_string(),
    }
}

/// The remote end of a session, driven frame by frame.
struct FakePeer {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

impl FakePeer {
    async fn handshake(stream: TcpStream, listen_addr: SocketAddr) -> Self {
        let mut framed = Framed::new(stream, frame::codec());
        let ours = postcard::to_allocvec(&descriptor(0xfe, listen_addr)).unwrap();
        framed.send(Bytes::from(ours)).await.unwrap();
        let theirs = framed.next().await.unwrap().unwrap();
        let remote: NodeDescriptor = postcard::from_bytes(&theirs).unwrap();
        assert_eq!(remote.network, NETWORK);
        Self { framed }
    }

    async fn send(&mut self, channel: ChannelId, msg: &PexMessage) {
        let payload = postcard::to_allocvec(msg).unwrap();
        self.framed
            .send(frame::encode_frame(channel, &payload))
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> Option<PexMessage> {
        let frame = tokio::time::timeout(WAIT, self.framed.next()).await.unwrap()?.ok()?;
        let (channel, payload) = frame::decode_frame(frame).unwrap();
        assert_eq!(channel, PEX_CHANNEL);
        Some(PexMessage::decode(&payload).unwrap())
    }
}

struct Node {
    switch: Switch,
    addr: SocketAddr,
    book: Arc<FileAddressBook>,
    _dir: tempfile::TempDir,
}

async fn node(seeds: Vec<PeerAddr>, max_outbound: usize, disconnect_wait: Duration) -> Node {
    let dir = tempfile::tempdir().unwrap();
    let book = Arc::new(FileAddressBook::open(dir.path().join("addrbook.json"), false).unwrap());

    let transport = Arc::new(TcpTransport::new(descriptor(1, "0.0.0.0:0".parse().unwrap())));
    let addr = transport.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();

    let pex = Arc::new(PexService::new(
        book.clone(),
        PexConfig::new(seeds, disconnect_wait),
    ));
    let switch = Switch::new(
        transport,
        pex,
        SwitchConfig {
            max_inbound: 8,
            max_outbound,
            allow_duplicate_ip: true,
            dial_interval: Duration::from_millis(100),
        },
    );
    switch.start().unwrap();

    Node {
        switch,
        addr,
        book,
        _dir: dir,
    }
}

#[tokio::test]
async fn outbound_crawl_stores_returned_addresses() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let fake_addr = listener.local_addr().unwrap();
    let node = node(vec![PeerAddr::new(fake_addr)], 1, WAIT).await;
    assert_eq!(node.book.size(), 0);

    let (stream, _) = tokio::time::timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let mut peer = FakePeer::handshake(stream, fake_addr).await;

    assert_eq!(peer.recv().await, Some(PexMessage::Request));
    let returned: Vec<SocketAddr> = ["10.0.0.1:26656", "10.0.0.2:26656", "10.0.0.3:26656", "10.0.0.1:26656"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();
    peer.send(PEX_CHANNEL, &PexMessage::Addrs(returned)).await;

    // seed mode hangs up once the answer is in
    assert_eq!(peer.recv().await, None);
    assert_eq!(node.book.size(), 3);
    let known = node.book.get(&"10.0.0.2:26656".parse().unwrap()).unwrap();
    assert_eq!(known.src, Some(fake_addr));

    node.switch.stop().await.unwrap();
}

#[tokio::test]
async fn inbound_request_is_answered_then_disconnected() {
    let node = node(vec![], 0, WAIT).await;
    let known: BTreeSet<SocketAddr> = ["10.1.0.1:26656", "10.1.0.2:26656"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();
    for addr in &known {
        node.book.add_address(*addr, None);
    }

    let stream = TcpStream::connect(node.addr).await.unwrap();
    let mut peer = FakePeer::handshake(stream, "0.0.0.0:7777".parse().unwrap()).await;
    peer.send(PEX_CHANNEL, &PexMessage::Request).await;

    let Some(PexMessage::Addrs(served)) = peer.recv().await else {
        panic!("expected addresses");
    };
    assert_eq!(served.into_iter().collect::<BTreeSet<_>>(), known);
    assert_eq!(peer.recv().await, None);

    // the advertised port is recorded under the observed IP
    assert!(node.book.contains(&"127.0.0.1:7777".parse().unwrap()));
    node.switch.stop().await.unwrap();
}

#[tokio::test]
async fn idle_inbound_peer_is_dropped_after_wait() {
    let node = node(vec![], 0, Duration::from_millis(200)).await;

    let stream = TcpStream::connect(node.addr).await.unwrap();
    let mut peer = FakePeer::handshake(stream, "127.0.0.1:7777".parse().unwrap()).await;
    assert_eq!(peer.recv().await, None);

    node.switch.stop().await.unwrap();
}

#[tokio::test]
async fn unknown_channel_ends_session() {
    let node = node(vec![], 0, WAIT).await;

    let stream = TcpStream::connect(node.addr).await.unwrap();
    let mut peer = FakePeer::handshake(stream, "127.0.0.1:7777".parse().unwrap()).await;
    peer.send(ChannelId(0x20), &PexMessage::Request).await;
    assert_eq!(peer.recv().await, None);

    node.switch.stop().await.unwrap();
}

#[tokio::test]
async fn unsolicited_addrs_drop_inbound_peer() {
    let node = node(vec![], 0, WAIT).await;

    let stream = TcpStream::connect(node.addr).await.unwrap();
    let mut peer = FakePeer::handshake(stream, "127.0.0.1:7777".parse().unwrap()).await;

    let pushed: Vec<SocketAddr> = (1..=250u16)
        .map(|port| SocketAddr::from(([10, 2, 0, 1], port)))
        .collect();
    peer.send(PEX_CHANNEL, &PexMessage::Addrs(pushed)).await;
    assert_eq!(peer.recv().await, None);

    // only the peer's own listen address was learned
    assert_eq!(node.book.size(), 1);
    assert!(node.book.contains(&"127.0.0.1:7777".parse().unwrap()));
    node.switch.stop().await.unwrap();
}
