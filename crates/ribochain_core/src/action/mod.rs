//! The uniform action contract: every verb an agent can invoke, `commit`,
//! `mod`, `del`, `get`, `getLink`, `send`, is one variant of [`Action`],
//! not a separate nominal type. `CommittingAction` and `ValidatingAction`
//! are capability traits answered by matching on the variant, rather than
//! by giving each verb its own struct and `impl` block.

pub mod args;
mod commit;
mod query;

pub use commit::{do_commit, do_del, do_mod, receive_del, receive_link, receive_mod, receive_put, receive_validate_request};
pub use query::{do_get, do_get_link, do_send, receive_get, receive_get_link, receive_send};

use self::args::{check_args, ArgSpec, ArgType, ArgValue};
use crate::context::Context;
use crate::dht::Status;
use crate::error::{CoreError, CoreResult};
use ribochain_types::{Entry, EntryType, Hash, PeerId};

/// Bitfield over what a `get` response carries back, mirroring `StatusMask`.
/// `GetMask::default() == ENTRY`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GetMask(u8);

impl GetMask {
    pub const ENTRY: u8 = 0b001;
    pub const ENTRY_TYPE: u8 = 0b010;
    pub const SOURCES: u8 = 0b100;

    pub fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub fn wants_entry(&self) -> bool {
        self.0 & Self::ENTRY != 0
    }

    pub fn wants_entry_type(&self) -> bool {
        self.0 & Self::ENTRY_TYPE != 0
    }

    pub fn wants_sources(&self) -> bool {
        self.0 & Self::SOURCES != 0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl Default for GetMask {
    fn default() -> Self {
        Self(Self::ENTRY)
    }
}

/// What a successful `get` found, already filtered per `GetMask`.
#[derive(Clone, Debug, Default)]
pub struct GetResult {
    pub entry: Option<Vec<u8>>,
    pub entry_type: Option<EntryType>,
    pub sources: Option<Vec<PeerId>>,
    pub follow_hash: Option<Hash>,
    pub status: Option<Status>,
}

/// One hit from a `getLink` query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkResult {
    pub hash: Hash,
    pub tag: String,
}

/// Whatever a `Do` produced. Each variant corresponds to one or more action
/// verbs' natural return shape rather than forcing everything through a
/// single type.
#[derive(Clone, Debug)]
pub enum ActionOutcome {
    Hash(Hash),
    Get(GetResult),
    Links(Vec<LinkResult>),
    Bytes(Vec<u8>),
    Unit,
}

/// The six user-facing verbs. Receive-side handling (the `PUT_REQUEST` etc.
/// a peer answers) is not a variant here; a receive is driven by an
/// incoming [`crate::transport::Message`], not by constructing an `Action`,
/// but it is implemented by the functions re-exported above, one per
/// verb, so the contract stays 1:1 with the uniform `{Name, Args, Do,
/// Receive}` even though the two sides don't share a struct.
#[derive(Clone, Debug)]
pub enum Action {
    Commit { entry: Entry },
    Mod { old_hash: Hash, new_entry: Entry },
    Del { target: Hash, message: String },
    Get { hash: Hash, status_mask: crate::dht::StatusMask, get_mask: GetMask },
    GetLink { base: Hash, tag: String, status_mask: crate::dht::StatusMask },
    Send { to: PeerId, zome: String, body: Vec<u8> },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Commit { .. } => "commit",
            Action::Mod { .. } => "mod",
            Action::Del { .. } => "del",
            Action::Get { .. } => "get",
            Action::GetLink { .. } => "getLink",
            Action::Send { .. } => "send",
        }
    }

    /// The initiating side: prepare/validate/persist locally, then notify
    /// the DHT's responsible peer(s) where the verb calls for it.
    pub async fn do_(&self, ctx: &Context) -> CoreResult<ActionOutcome> {
        match self {
            Action::Commit { entry } => do_commit(ctx, entry.clone()).await.map(ActionOutcome::Hash),
            Action::Mod { old_hash, new_entry } => {
                do_mod(ctx, old_hash.clone(), new_entry.clone()).await.map(ActionOutcome::Hash)
            }
            Action::Del { target, message } => {
                do_del(ctx, target.clone(), message.clone()).await.map(ActionOutcome::Hash)
            }
            Action::Get { hash, status_mask, get_mask } => {
                do_get(ctx, hash, *status_mask, *get_mask).await.map(ActionOutcome::Get)
            }
            Action::GetLink { base, tag, status_mask } => {
                do_get_link(ctx, base, tag, *status_mask).await.map(ActionOutcome::Links)
            }
            Action::Send { to, zome, body } => {
                do_send(ctx, to, zome, body.clone()).await.map(ActionOutcome::Bytes)
            }
        }
    }
}

/// Per-verb argument shape, keyed by [`Action::name`]. This is the only
/// place that maps the stringly-typed call convention `build_action` takes
/// onto the fields each `Action` variant actually holds.
fn arg_spec(name: &str) -> CoreResult<&'static [ArgSpec]> {
    const COMMIT: &[ArgSpec] = &[ArgSpec::required("entry", ArgType::Entry)];
    const MOD: &[ArgSpec] = &[
        ArgSpec::required("oldHash", ArgType::Hash),
        ArgSpec::required("newEntry", ArgType::Entry),
    ];
    const DEL: &[ArgSpec] = &[
        ArgSpec::required("target", ArgType::Hash),
        ArgSpec::required("message", ArgType::String),
    ];
    const GET: &[ArgSpec] = &[
        ArgSpec::required("hash", ArgType::Hash),
        ArgSpec::optional("statusMask", ArgType::Int),
        ArgSpec::optional("getMask", ArgType::Int),
    ];
    const GET_LINK: &[ArgSpec] = &[
        ArgSpec::required("base", ArgType::Hash),
        ArgSpec::required("tag", ArgType::String),
        ArgSpec::optional("statusMask", ArgType::Int),
    ];
    const SEND: &[ArgSpec] = &[
        ArgSpec::required("to", ArgType::String),
        ArgSpec::required("zome", ArgType::String),
        ArgSpec::required("body", ArgType::AnyToString),
    ];
    match name {
        "commit" => Ok(COMMIT),
        "mod" => Ok(MOD),
        "del" => Ok(DEL),
        "get" => Ok(GET),
        "getLink" => Ok(GET_LINK),
        "send" => Ok(SEND),
        other => Err(CoreError::UnknownAction(other.to_string())),
    }
}

fn arg_hash(args: &[ArgValue], index: usize) -> Hash {
    match &args[index] {
        ArgValue::Hash(h) => h.clone(),
        _ => unreachable!("check_args already verified the shape"),
    }
}

fn arg_string(args: &[ArgValue], index: usize) -> String {
    match &args[index] {
        ArgValue::String(s) => s.clone(),
        _ => unreachable!("check_args already verified the shape"),
    }
}

fn arg_entry(args: &[ArgValue], index: usize) -> Entry {
    match &args[index] {
        ArgValue::Entry(e) => e.clone(),
        _ => unreachable!("check_args already verified the shape"),
    }
}

fn arg_any_to_string(args: &[ArgValue], index: usize) -> String {
    match &args[index] {
        ArgValue::AnyToString(s) => s.clone(),
        _ => unreachable!("check_args already verified the shape"),
    }
}

fn arg_mask_or(args: &[ArgValue], index: usize, default: u8) -> u8 {
    match args.get(index) {
        Some(ArgValue::Int(n)) => *n as u8,
        _ => default,
    }
}

/// Build an [`Action`] from its name and a stringly-typed argument list,
/// the path `hdk::call`'s "call a zome function by name" pattern stands in
/// for here. Every other call site in this crate builds an `Action` variant
/// directly from already-typed fields; this is the one entry point that
/// exercises [`args::check_args`].
pub fn build_action(name: &str, args: Vec<ArgValue>) -> CoreResult<Action> {
    let spec = arg_spec(name)?;
    check_args(spec, &args)?;
    Ok(match name {
        "commit" => Action::Commit { entry: arg_entry(&args, 0) },
        "mod" => Action::Mod { old_hash: arg_hash(&args, 0), new_entry: arg_entry(&args, 1) },
        "del" => Action::Del { target: arg_hash(&args, 0), message: arg_string(&args, 1) },
        "get" => Action::Get {
            hash: arg_hash(&args, 0),
            status_mask: crate::dht::StatusMask::new(arg_mask_or(&args, 1, crate::dht::StatusMask::default_mask().bits())),
            get_mask: GetMask::new(arg_mask_or(&args, 2, GetMask::default().bits())),
        },
        "getLink" => Action::GetLink {
            base: arg_hash(&args, 0),
            tag: arg_string(&args, 1),
            status_mask: crate::dht::StatusMask::new(arg_mask_or(&args, 2, crate::dht::StatusMask::default_mask().bits())),
        },
        "send" => Action::Send {
            to: PeerId(arg_string(&args, 0)),
            zome: arg_string(&args, 1),
            body: arg_any_to_string(&args, 2).into_bytes(),
        },
        _ => unreachable!("arg_spec already rejected unknown names"),
    })
}

/// Whether an action's `Do` appends to the local chain. Answered by
/// matching on the variant: this is a property of the data, not a
/// separate trait object per verb.
pub trait CommittingAction {
    fn is_committing(&self) -> bool;
}

impl CommittingAction for Action {
    fn is_committing(&self) -> bool {
        matches!(self, Action::Commit { .. } | Action::Mod { .. } | Action::Del { .. })
    }
}

/// Whether an action's `Do` runs through `ValidationDriver::validate_action`
/// at all. `get`/`getLink`/`send` on the initiating side do not; their
/// receive-side counterparts validate as part of the originating peer's
/// record, not a fresh commit.
pub trait ValidatingAction {
    fn is_validating(&self) -> bool;
}

impl ValidatingAction for Action {
    fn is_validating(&self) -> bool {
        self.is_committing()
    }
}

/// `mod`/`del`'s `CheckValidationRequest`: a `Links` batch has its own
/// add/retract semantics (one entry, many link assertions) and isn't
/// individually replaceable or deletable the way a single record is.
pub fn reject_links_entry_type(def: &ribochain_types::EntryDef) -> CoreResult<()> {
    if def.data_format == ribochain_types::DataFormat::Links {
        Err(CoreError::ValidationFailed(
            "mod/del do not apply to Links entries".into(),
        ))
    } else {
        Ok(())
    }
}
