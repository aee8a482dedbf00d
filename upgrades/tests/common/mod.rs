//! Auction modules and a wired-up orchestrator shared by the integration
//! tests.
#![allow(dead_code)]
use std::sync::Arc;

use alloy_json_abi::JsonAbi;
use alloy_primitives::{uint, Address, B256, U256};
use alloy_sol_types::{sol, SolCall, SolInterface};
use devnet::{
    access::Ownable,
    proxy::{Initializable, UupsUpgradeable},
    storage::{address_to_word, mapping_slot, word_to_address},
    Context, Devnet, Program, ProgramResult, Revert,
};
use proxy_upgrades::{
    DevnetEndpoint, ImplementationDeployer, MemoryRecordStore,
    ModuleDefinition, Orchestrator, ProxyArtifacts, ProxyController,
    ProxyKind, RecordStore, Verifier,
};

pub const DEPLOYER: Address = Address::repeat_byte(0xde);
pub const ADMIN: Address = Address::repeat_byte(0xad);
pub const MALLORY: Address = Address::repeat_byte(0x66);
pub const NFT: Address = Address::repeat_byte(0x7f);

/// Block time the auctions are created at.
pub const START_TIME: u64 = 100_000;

sol! {
    interface INftAuction {
        function initialize() external;
        function createAuction(
            uint256 duration,
            uint256 startPrice,
            address nftAddress,
            uint256 tokenId
        ) external;
        function auctions(uint256 id) external view returns (
            address seller,
            uint256 duration,
            uint256 startPrice,
            uint256 startTime,
            bool ended,
            address highestBidder,
            uint256 highestBid,
            address nftContract,
            uint256 tokenId
        );
        function nextAuctionId() external view returns (uint256);
        function testHelloUpgrade() external pure returns (string);
    }
}

pub use INftAuction::{
    auctionsCall, createAuctionCall, initializeCall, nextAuctionIdCall,
    testHelloUpgradeCall,
};

const AUCTIONS_SLOT: U256 = uint!(0_U256);
const NEXT_AUCTION_ID_SLOT: U256 = uint!(1_U256);
const MIN_DURATION: U256 = uint!(60_000_U256);

pub const GREETING: &str = "Hello, World!";

/// Storage slot of field `field` of auction `id`.
pub fn auction_slot(id: u64, field: usize) -> B256 {
    let base = mapping_slot(U256::from(id), AUCTIONS_SLOT);
    B256::from(base + U256::from(field))
}

/// Slot of `startTime` in auction `id`.
pub fn start_time_slot(id: u64) -> B256 {
    auction_slot(id, 3)
}

/// An English auction module.
///
/// Version 2 adds `testHelloUpgrade`; the storage layout never changes.
struct NftAuction {
    version: u8,
    self_managed: bool,
}

impl NftAuction {
    fn create(
        ctx: &mut Context<'_>,
        call: &createAuctionCall,
    ) -> Result<(), Revert> {
        Ownable::only_owner(ctx)?;
        if call.duration <= MIN_DURATION {
            return Err(Revert::message("Duration must be greater than 1min"));
        }
        if call.startPrice.is_zero() {
            return Err(Revert::message("Start price must be greater than 0"));
        }
        let id = ctx.sload(NEXT_AUCTION_ID_SLOT);
        let base = mapping_slot(id, AUCTIONS_SLOT);
        let fields = [
            address_to_word(ctx.sender()),
            call.duration,
            call.startPrice,
            U256::from(ctx.timestamp()),
            U256::ZERO,
            U256::ZERO,
            U256::ZERO,
            address_to_word(call.nftAddress),
            call.tokenId,
        ];
        for (offset, value) in fields.into_iter().enumerate() {
            ctx.sstore(base + U256::from(offset), value);
        }
        ctx.sstore(NEXT_AUCTION_ID_SLOT, id + U256::from(1));
        Ok(())
    }

    fn read(ctx: &Context<'_>, id: U256) -> INftAuction::auctionsReturn {
        let base = mapping_slot(id, AUCTIONS_SLOT);
        let word = |field: usize| ctx.sload(base + U256::from(field));
        INftAuction::auctionsReturn {
            seller: word_to_address(word(0)),
            duration: word(1),
            startPrice: word(2),
            startTime: word(3),
            ended: !word(4).is_zero(),
            highestBidder: word_to_address(word(5)),
            highestBid: word(6),
            nftContract: word_to_address(word(7)),
            tokenId: word(8),
        }
    }
}

impl Program for NftAuction {
    fn construct(
        &self,
        ctx: &mut Context<'_>,
        _args: &[u8],
    ) -> Result<(), Revert> {
        Initializable::disable_initializers(ctx);
        Ok(())
    }

    fn call(&self, ctx: &mut Context<'_>, input: &[u8]) -> ProgramResult {
        if self.self_managed {
            if let Some(result) =
                UupsUpgradeable::dispatch(ctx, input, Ownable::only_owner)
            {
                return result;
            }
        }
        match INftAuction::INftAuctionCalls::abi_decode(input)
            .map_err(|e| Revert::malformed(&e))?
        {
            INftAuction::INftAuctionCalls::initialize(_) => {
                Initializable::initializer(ctx)?;
                let admin = ctx.sender();
                Ownable::init(ctx, admin)?;
                Ok(Vec::new())
            }
            INftAuction::INftAuctionCalls::createAuction(call) => {
                Self::create(ctx, &call)?;
                Ok(Vec::new())
            }
            INftAuction::INftAuctionCalls::auctions(call) => {
                Ok(auctionsCall::abi_encode_returns(&Self::read(ctx, call.id)))
            }
            INftAuction::INftAuctionCalls::nextAuctionId(_) => Ok(
                nextAuctionIdCall::abi_encode_returns(
                    &ctx.sload(NEXT_AUCTION_ID_SLOT),
                ),
            ),
            INftAuction::INftAuctionCalls::testHelloUpgrade(_)
                if self.version >= 2 =>
            {
                Ok(testHelloUpgradeCall::abi_encode_returns(
                    &GREETING.to_owned(),
                ))
            }
            INftAuction::INftAuctionCalls::testHelloUpgrade(_) => {
                Err(Revert::message("unknown function"))
            }
        }
    }
}

fn interface(version: u8, kind: ProxyKind) -> JsonAbi {
    let mut signatures = vec![
        "function initialize()",
        "function createAuction(uint256 duration, uint256 startPrice, \
         address nftAddress, uint256 tokenId)",
        "function auctions(uint256 id) returns (address seller, \
         uint256 duration, uint256 startPrice, uint256 startTime, \
         bool ended, address highestBidder, uint256 highestBid, \
         address nftContract, uint256 tokenId)",
        "function nextAuctionId() returns (uint256)",
    ];
    if version >= 2 {
        signatures.push("function testHelloUpgrade() returns (string)");
    }
    if kind == ProxyKind::SelfManaged {
        signatures.push(
            "function upgradeToAndCall(address newImplementation, bytes data)",
        );
        signatures.push("function proxiableUUID() returns (bytes32)");
    }
    JsonAbi::parse(signatures).expect("auction interface should parse")
}

/// Installs `version` of the auction for proxies of `kind`.
pub fn nft_auction(
    devnet: &Devnet,
    kind: ProxyKind,
    version: u8,
) -> ModuleDefinition {
    let name = match kind {
        ProxyKind::AdminManaged => format!("NftAuctionV{version}"),
        ProxyKind::SelfManaged => format!("NftAuctionUUPSV{version}"),
    };
    let bytecode = devnet.install(
        &name,
        NftAuction { version, self_managed: kind == ProxyKind::SelfManaged },
    );
    ModuleDefinition::new(name, bytecode, interface(version, kind))
}

/// Calldata of the auction initializer.
pub fn init_data() -> Vec<u8> {
    initializeCall {}.abi_encode()
}

/// The auction every scenario starts with.
pub fn sample_auction() -> createAuctionCall {
    createAuctionCall {
        duration: U256::from(100 * 1000),
        // 0.01 ether
        startPrice: U256::from(10_000_000_000_000_000_u64),
        nftAddress: Address::ZERO,
        tokenId: U256::from(1),
    }
}

/// A devnet plus everything needed to drive upgrades on it.
pub struct Fixture<S = MemoryRecordStore> {
    pub devnet: Arc<Devnet>,
    pub endpoint: DevnetEndpoint,
    pub orchestrator: Orchestrator<DevnetEndpoint, S>,
    pub verifier: Verifier<DevnetEndpoint>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_store(MemoryRecordStore::new())
    }
}

impl<S: RecordStore> Fixture<S> {
    pub fn with_store(store: S) -> Self {
        init_tracing();
        let devnet = Arc::new(Devnet::new());
        devnet.set_timestamp(START_TIME);
        let endpoint = DevnetEndpoint::new(Arc::clone(&devnet));
        let deployer = ImplementationDeployer::new(endpoint.clone(), DEPLOYER);
        let controller =
            ProxyController::new(deployer, ProxyArtifacts::devnet());
        let orchestrator = Orchestrator::new(controller, store);
        let verifier = Verifier::new(endpoint.clone(), DEPLOYER);
        Self { devnet, endpoint, orchestrator, verifier }
    }

    pub fn auction(&self, kind: ProxyKind, version: u8) -> ModuleDefinition {
        nft_auction(&self.devnet, kind, version)
    }
}

/// Routes `tracing` output through the test harness when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
