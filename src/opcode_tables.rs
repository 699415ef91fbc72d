//! SCUMM v5 opcode registry and sub-opcode tables.
//!
//! Every mnemonic is declared once as `(op, base byte, mode mask, form)`.
//! The registry expands the mask into every concrete opcode byte, so all
//! addressing-mode combinations of a mnemonic are registered together.

use indexmap::IndexMap;
use log::debug;

use crate::error::ScummError;

/// One parameter slot of an instruction layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// Variable or 8-bit literal, selected by the next mode bit.
    Byte,
    /// Variable or 16-bit literal, selected by the next mode bit.
    Word,
    /// Always a variable reference.
    Var,
    RawByte,
    RawWord,
    /// 24-bit tick count.
    Ticks,
    /// 0xFF-terminated list of prefixed words.
    List,
    Text,
    /// A fresh mode byte; following parameters use its bits.
    Modes,
    /// Mode position that carries no parameter.
    Skip,
}

impl Param {
    pub fn uses_mode_bit(&self) -> bool {
        matches!(self, Param::Byte | Param::Word | Param::Skip)
    }
}

/// Named setter inside a sub-opcode family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubOp {
    pub code: u8,
    pub name: &'static str,
    pub params: &'static [Param],
    /// A result variable follows the sub-opcode byte.
    pub stores: bool,
}

#[derive(Debug)]
pub struct SubOpTable {
    pub family: &'static str,
    pub entries: &'static [SubOp],
    /// Setters repeat until 0xFF.
    pub repeat: bool,
    /// Setter that ends the block without a terminator.
    pub closing: Option<u8>,
    /// Code meaning "no setter" for single-setter blocks.
    pub empty: Option<u8>,
}

impl SubOpTable {
    pub fn by_code(&self, code: u8) -> Option<&'static SubOp> {
        self.entries.iter().find(|e| e.code == code)
    }

    pub fn by_name(&self, name: &str) -> Option<&'static SubOp> {
        self.entries.iter().find(|e| e.name == name)
    }
}

/// Instruction family and its fixed layout.
#[derive(Debug, Clone, Copy)]
pub enum Form {
    Call(&'static [Param]),
    /// Result variable first, then the parameters.
    Store(&'static [Param]),
    /// `target <symbol> value`; `with_value` is false for `++`/`--`.
    Update { symbol: &'static str, with_value: bool },
    /// `unless (var <symbol> value) goto`.
    Compare(&'static str),
    /// `unless (v) goto` or, when `negated`, `unless (!v) goto`.
    Test { negated: bool },
    /// `unless (name(args)) goto`.
    Predicate(&'static [Param]),
    Jump,
    /// Leading parameters followed by setters.
    Block {
        leading: &'static [Param],
        table: &'static SubOpTable,
    },
    /// Exactly one setter, written as a flat statement.
    Select(&'static SubOpTable),
    Expression,
    StartScript,
    Sentence,
    SetVarRange,
    PseudoRoom,
    Override,
}

macro_rules! mnemonics {
    ($($variant:ident => $name:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Op {
            $($variant,)*
        }

        impl Op {
            pub fn name(&self) -> &'static str {
                match self {
                    $(Op::$variant => $name,)*
                }
            }
        }
    };
}

mnemonics! {
    StopObjectCode => "stopObjectCode",
    PutActor => "putActor",
    StartMusic => "startMusic",
    GetActorRoom => "getActorRoom",
    IsGreaterEqual => "isGreaterEqual",
    DrawObject => "drawObject",
    GetActorElevation => "getActorElevation",
    SetState => "setState",
    IsNotEqual => "isNotEqual",
    FaceActor => "faceActor",
    StartScript => "startScript",
    GetVerbEntrypoint => "getVerbEntrypoint",
    ResourceRoutines => "resourceRoutines",
    WalkActorToActor => "walkActorToActor",
    PutActorAtObject => "putActorAtObject",
    GetObjectState => "getObjectState",
    GetObjectOwner => "getObjectOwner",
    AnimateActor => "animateActor",
    PanCameraTo => "panCameraTo",
    ActorOps => "actorOps",
    Print => "print",
    ActorFromPos => "actorFromPos",
    GetRandomNr => "getRandomNr",
    And => "and",
    JumpRelative => "jumpRelative",
    DoSentence => "doSentence",
    Move => "move",
    Multiply => "multiply",
    StartSound => "startSound",
    IfClassOfIs => "ifClassOfIs",
    WalkActorTo => "walkActorTo",
    IsActorInBox => "isActorInBox",
    StopMusic => "stopMusic",
    GetAnimCounter => "getAnimCounter",
    GetActorY => "getActorY",
    LoadRoomWithEgo => "loadRoomWithEgo",
    PickupObject => "pickupObject",
    SetVarRange => "setVarRange",
    StringOps => "stringOps",
    EqualZero => "equalZero",
    SetOwnerOf => "setOwnerOf",
    DelayVariable => "delayVariable",
    CursorCommand => "cursorCommand",
    PutActorInRoom => "putActorInRoom",
    Delay => "delay",
    IfNotState => "ifNotState",
    MatrixOps => "matrixOps",
    GetInventoryCount => "getInventoryCount",
    SetCameraAt => "setCameraAt",
    RoomOps => "roomOps",
    GetDist => "getDist",
    FindObject => "findObject",
    WalkActorToObject => "walkActorToObject",
    StartObject => "startObject",
    IsLessEqual => "isLessEqual",
    Subtract => "subtract",
    GetActorScale => "getActorScale",
    StopSound => "stopSound",
    FindInventory => "findInventory",
    DrawBox => "drawBox",
    Cutscene => "cutscene",
    ChainScript => "chainScript",
    GetActorX => "getActorX",
    IsLess => "isLess",
    Increment => "increment",
    IsEqual => "isEqual",
    SoundKludge => "soundKludge",
    IfState => "ifState",
    PickupObjectOld => "pickupObjectOld",
    ActorFollowCamera => "actorFollowCamera",
    SetObjectName => "setObjectName",
    GetActorMoving => "getActorMoving",
    Or => "or",
    Override => "override",
    Add => "add",
    Divide => "divide",
    OldRoomEffect => "oldRoomEffect",
    SetClass => "setClass",
    FreezeScripts => "freezeScripts",
    StopScript => "stopScript",
    GetActorFacing => "getActorFacing",
    GetClosestObjActor => "getClosestObjActor",
    GetStringWidth => "getStringWidth",
    IsScriptRunning => "isScriptRunning",
    Debug => "debug",
    GetActorWidth => "getActorWidth",
    StopObjectScript => "stopObjectScript",
    Lights => "lights",
    GetActorCostume => "getActorCostume",
    LoadRoom => "loadRoom",
    IsGreater => "isGreater",
    VerbOps => "verbOps",
    GetActorWalkBox => "getActorWalkBox",
    IsSoundRunning => "isSoundRunning",
    BreakHere => "breakHere",
    SystemOps => "systemOps",
    StopObjectCode2 => "stopObjectCode2",
    NotEqualZero => "notEqualZero",
    SaveRestoreVerbs => "saveRestoreVerbs",
    Expression => "expression",
    Wait => "wait",
    EndCutscene => "endCutscene",
    Decrement => "decrement",
    PseudoRoom => "pseudoRoom",
    PrintEgo => "printEgo",
}

use Param::{Byte as B, List as L, Modes as M, RawByte as RB, RawWord as RW, Skip as S, Text as T, Word as W};

const fn setter(code: u8, name: &'static str, params: &'static [Param]) -> SubOp {
    SubOp {
        code,
        name,
        params,
        stores: false,
    }
}

pub static ACTOR_OPS: SubOpTable = SubOpTable {
    family: "actorOps",
    repeat: true,
    closing: None,
    empty: None,
    entries: &[
        setter(0, "dummy", &[B]),
        setter(1, "costume", &[B]),
        setter(2, "stepDist", &[B, B]),
        setter(3, "sound", &[B]),
        setter(4, "walkAnimation", &[B]),
        setter(5, "talkAnimation", &[B, B]),
        setter(6, "standAnimation", &[B]),
        setter(7, "animation", &[B, B, B]),
        setter(8, "default", &[]),
        setter(9, "elevation", &[W]),
        setter(10, "animationDefault", &[]),
        setter(11, "palette", &[B, B]),
        setter(12, "talkColor", &[B]),
        setter(13, "name", &[T]),
        setter(14, "initAnimation", &[B]),
        setter(16, "width", &[B]),
        setter(17, "scale", &[B, B]),
        setter(18, "neverZClip", &[]),
        setter(19, "alwaysZClip", &[B]),
        setter(20, "ignoreBoxes", &[]),
        setter(21, "followBoxes", &[]),
        setter(22, "animationSpeed", &[B]),
        setter(23, "shadow", &[B]),
    ],
};

pub static VERB_OPS: SubOpTable = SubOpTable {
    family: "verbOps",
    repeat: true,
    closing: None,
    empty: None,
    entries: &[
        setter(1, "image", &[W]),
        setter(2, "name", &[T]),
        setter(3, "color", &[B]),
        setter(4, "hiColor", &[B]),
        setter(5, "at", &[W, W]),
        setter(6, "on", &[]),
        setter(7, "off", &[]),
        setter(8, "delete", &[]),
        setter(9, "new", &[]),
        setter(16, "dimColor", &[B]),
        setter(17, "dim", &[]),
        setter(18, "key", &[B]),
        setter(19, "center", &[]),
        setter(20, "nameString", &[W]),
        setter(22, "assignObject", &[W, B]),
        setter(23, "backColor", &[B]),
    ],
};

const PRINT_SETTERS: &[SubOp] = &[
    setter(0, "at", &[W, W]),
    setter(1, "color", &[B]),
    setter(2, "clipped", &[W]),
    setter(3, "erase", &[W, W]),
    setter(4, "center", &[]),
    setter(6, "left", &[]),
    setter(7, "overhead", &[]),
    setter(8, "sayVoice", &[W, W]),
    setter(15, "text", &[T]),
];

pub static PRINT_OPS: SubOpTable = SubOpTable {
    family: "print",
    repeat: true,
    closing: Some(15),
    empty: None,
    entries: PRINT_SETTERS,
};

pub static PRINT_EGO_OPS: SubOpTable = SubOpTable {
    family: "printEgo",
    repeat: true,
    closing: Some(15),
    empty: None,
    entries: PRINT_SETTERS,
};

pub static DRAW_OBJECT_OPS: SubOpTable = SubOpTable {
    family: "drawObject",
    repeat: false,
    closing: None,
    empty: Some(0x1f),
    entries: &[setter(1, "at", &[W, W]), setter(2, "state", &[W])],
};

pub static RESOURCE_ROUTINES: SubOpTable = SubOpTable {
    family: "resourceRoutines",
    repeat: false,
    closing: None,
    empty: None,
    entries: &[
        setter(1, "loadScript", &[B]),
        setter(2, "loadSound", &[B]),
        setter(3, "loadCostume", &[B]),
        setter(4, "loadRoomResource", &[B]),
        setter(5, "nukeScript", &[B]),
        setter(6, "nukeSound", &[B]),
        setter(7, "nukeCostume", &[B]),
        setter(8, "nukeRoom", &[B]),
        setter(9, "lockScript", &[B]),
        setter(10, "lockSound", &[B]),
        setter(11, "lockCostume", &[B]),
        setter(12, "lockRoom", &[B]),
        setter(13, "unlockScript", &[B]),
        setter(14, "unlockSound", &[B]),
        setter(15, "unlockCostume", &[B]),
        setter(16, "unlockRoom", &[B]),
        setter(17, "clearHeap", &[]),
        setter(18, "loadCharset", &[B]),
        setter(19, "nukeCharset", &[B]),
        setter(20, "loadFlObject", &[B, W]),
    ],
};

pub static ROOM_OPS: SubOpTable = SubOpTable {
    family: "roomOps",
    repeat: false,
    closing: None,
    empty: None,
    entries: &[
        setter(1, "roomScroll", &[W, W]),
        setter(2, "roomColor", &[W, W]),
        setter(3, "setScreen", &[W, W]),
        setter(4, "setPalColor", &[W, W, W, M, B]),
        setter(5, "shakeOn", &[]),
        setter(6, "shakeOff", &[]),
        setter(7, "roomScale", &[B, B, M, B, B, M, S, B]),
        setter(8, "roomIntensity", &[B, B, B]),
        setter(9, "saveLoad", &[B, B]),
        setter(10, "screenEffect", &[W]),
        setter(11, "rgbRoomIntensity", &[W, W, W, M, B, B]),
        setter(12, "roomShadow", &[W, W, W, M, B, B]),
        setter(13, "saveString", &[B, T]),
        setter(14, "loadString", &[B, T]),
        setter(15, "palManipulate", &[B, M, B, B, M, B]),
        setter(16, "colorCycleDelay", &[B, B]),
    ],
};

pub static CURSOR_COMMANDS: SubOpTable = SubOpTable {
    family: "cursorCommand",
    repeat: false,
    closing: None,
    empty: None,
    entries: &[
        setter(1, "cursorOn", &[]),
        setter(2, "cursorOff", &[]),
        setter(3, "userputOn", &[]),
        setter(4, "userputOff", &[]),
        setter(5, "cursorSoftOn", &[]),
        setter(6, "cursorSoftOff", &[]),
        setter(7, "userputSoftOn", &[]),
        setter(8, "userputSoftOff", &[]),
        setter(10, "setCursorImage", &[B, B]),
        setter(11, "setCursorHotspot", &[B, B, B]),
        setter(12, "setCursor", &[B]),
        setter(13, "initCharset", &[B]),
        setter(14, "charsetColors", &[L]),
    ],
};

pub static STRING_OPS: SubOpTable = SubOpTable {
    family: "stringOps",
    repeat: false,
    closing: None,
    empty: None,
    entries: &[
        setter(1, "putCodeInString", &[B, T]),
        setter(2, "copyString", &[B, B]),
        setter(3, "setStringChar", &[B, B, B]),
        SubOp {
            code: 4,
            name: "getStringChar",
            params: &[B, B],
            stores: true,
        },
        setter(5, "createString", &[B, B]),
    ],
};

pub static MATRIX_OPS: SubOpTable = SubOpTable {
    family: "matrixOps",
    repeat: false,
    closing: None,
    empty: None,
    entries: &[
        setter(1, "setBoxFlags", &[B, B]),
        setter(2, "setBoxScale", &[B, B]),
        setter(3, "setBoxSlot", &[B, B]),
        setter(4, "createBoxMatrix", &[]),
    ],
};

pub static SYSTEM_OPS: SubOpTable = SubOpTable {
    family: "systemOps",
    repeat: false,
    closing: None,
    empty: None,
    entries: &[
        setter(1, "restartGame", &[]),
        setter(2, "pauseGame", &[]),
        setter(3, "quitGame", &[]),
    ],
};

pub static WAIT_OPS: SubOpTable = SubOpTable {
    family: "wait",
    repeat: false,
    closing: None,
    empty: None,
    entries: &[
        setter(1, "waitForActor", &[B]),
        setter(2, "waitForMessage", &[]),
        setter(3, "waitForCamera", &[]),
        setter(4, "waitForSentence", &[]),
    ],
};

pub static SAVE_RESTORE_VERBS: SubOpTable = SubOpTable {
    family: "saveRestoreVerbs",
    repeat: false,
    closing: None,
    empty: None,
    entries: &[
        setter(1, "saveVerbs", &[B, B, B]),
        setter(2, "restoreVerbs", &[B, B, B]),
        setter(3, "deleteVerbs", &[B, B, B]),
    ],
};

pub static OLD_ROOM_EFFECT: SubOpTable = SubOpTable {
    family: "oldRoomEffect",
    repeat: false,
    closing: None,
    empty: None,
    entries: &[setter(3, "oldRoomEffect", &[W])],
};

#[derive(Debug, Clone, Copy)]
pub struct OpcodeSpec {
    pub op: Op,
    pub base: u8,
    pub mask: u8,
    /// High bits the engine accepts but never reads. They are registered
    /// and kept on the decoded instruction so the byte survives re-encoding.
    pub ignored: u8,
    pub form: Form,
}

impl OpcodeSpec {
    const fn ignoring(self, ignored: u8) -> OpcodeSpec {
        OpcodeSpec { ignored, ..self }
    }
}

const fn spec(op: Op, base: u8, mask: u8, form: Form) -> OpcodeSpec {
    OpcodeSpec {
        op,
        base,
        mask,
        ignored: 0,
        form,
    }
}

const fn call(op: Op, base: u8, mask: u8, params: &'static [Param]) -> OpcodeSpec {
    spec(op, base, mask, Form::Call(params))
}

const fn store(op: Op, base: u8, mask: u8, params: &'static [Param]) -> OpcodeSpec {
    spec(op, base, mask, Form::Store(params))
}

const fn update(op: Op, base: u8, symbol: &'static str, with_value: bool) -> OpcodeSpec {
    let mask = if with_value { 0x80 } else { 0x00 };
    spec(op, base, mask, Form::Update { symbol, with_value })
}

const fn compare(op: Op, base: u8, symbol: &'static str) -> OpcodeSpec {
    spec(op, base, 0x80, Form::Compare(symbol))
}

const fn select(op: Op, base: u8, table: &'static SubOpTable) -> OpcodeSpec {
    spec(op, base, 0x00, Form::Select(table))
}

/// The v5 instruction set.
pub static OPCODE_SPECS: &[OpcodeSpec] = &[
    call(Op::StopObjectCode, 0x00, 0x00, &[]),
    call(Op::PutActor, 0x01, 0xe0, &[B, W, W]),
    call(Op::StartMusic, 0x02, 0x80, &[B]),
    store(Op::GetActorRoom, 0x03, 0x80, &[B]),
    compare(Op::IsGreaterEqual, 0x04, "<="),
    spec(Op::DrawObject, 0x05, 0x80, Form::Block { leading: &[W], table: &DRAW_OBJECT_OPS })
        .ignoring(0x40),
    store(Op::GetActorElevation, 0x06, 0x80, &[B]),
    call(Op::SetState, 0x07, 0xc0, &[W, B]),
    compare(Op::IsNotEqual, 0x08, "!="),
    call(Op::FaceActor, 0x09, 0xc0, &[B, W]),
    spec(Op::StartScript, 0x0a, 0xe0, Form::StartScript),
    store(Op::GetVerbEntrypoint, 0x0b, 0xc0, &[W, W]),
    select(Op::ResourceRoutines, 0x0c, &RESOURCE_ROUTINES).ignoring(0x80),
    call(Op::WalkActorToActor, 0x0d, 0xc0, &[B, B, RB]),
    call(Op::PutActorAtObject, 0x0e, 0xc0, &[B, W]),
    store(Op::GetObjectState, 0x0f, 0x80, &[W]),
    store(Op::GetObjectOwner, 0x10, 0x80, &[W]),
    call(Op::AnimateActor, 0x11, 0xc0, &[B, B]),
    call(Op::PanCameraTo, 0x12, 0x80, &[W]),
    spec(Op::ActorOps, 0x13, 0x80, Form::Block { leading: &[B], table: &ACTOR_OPS })
        .ignoring(0x40),
    spec(Op::Print, 0x14, 0x80, Form::Block { leading: &[B], table: &PRINT_OPS }),
    store(Op::ActorFromPos, 0x15, 0xc0, &[W, W]),
    store(Op::GetRandomNr, 0x16, 0x80, &[B]),
    update(Op::And, 0x17, "&=", true),
    spec(Op::JumpRelative, 0x18, 0x00, Form::Jump),
    // a literal 0xFE verb stops the sentence; the other two bits go unread
    spec(Op::DoSentence, 0x19, 0xe0, Form::Sentence).ignoring(0x60),
    update(Op::Move, 0x1a, "=", true),
    update(Op::Multiply, 0x1b, "*=", true),
    call(Op::StartSound, 0x1c, 0x80, &[B]),
    spec(Op::IfClassOfIs, 0x1d, 0x80, Form::Predicate(&[W, L])),
    call(Op::WalkActorTo, 0x1e, 0xe0, &[B, W, W]),
    spec(Op::IsActorInBox, 0x1f, 0xc0, Form::Predicate(&[B, B])),
    call(Op::StopMusic, 0x20, 0x00, &[]),
    store(Op::GetAnimCounter, 0x22, 0x80, &[B]),
    store(Op::GetActorY, 0x23, 0x80, &[W]),
    call(Op::LoadRoomWithEgo, 0x24, 0xc0, &[W, B, RW, RW]),
    call(Op::PickupObject, 0x25, 0xc0, &[W, B]),
    spec(Op::SetVarRange, 0x26, 0x80, Form::SetVarRange),
    select(Op::StringOps, 0x27, &STRING_OPS),
    spec(Op::EqualZero, 0x28, 0x00, Form::Test { negated: true }),
    call(Op::SetOwnerOf, 0x29, 0xc0, &[W, B]),
    call(Op::DelayVariable, 0x2b, 0x00, &[Param::Var]),
    select(Op::CursorCommand, 0x2c, &CURSOR_COMMANDS),
    call(Op::PutActorInRoom, 0x2d, 0xc0, &[B, B]),
    call(Op::Delay, 0x2e, 0x00, &[Param::Ticks]),
    spec(Op::IfNotState, 0x2f, 0xc0, Form::Predicate(&[W, B])),
    select(Op::MatrixOps, 0x30, &MATRIX_OPS).ignoring(0x80),
    store(Op::GetInventoryCount, 0x31, 0x80, &[B]),
    call(Op::SetCameraAt, 0x32, 0x80, &[W]),
    select(Op::RoomOps, 0x33, &ROOM_OPS).ignoring(0xc0),
    store(Op::GetDist, 0x34, 0xc0, &[W, W]),
    store(Op::FindObject, 0x35, 0xc0, &[B, B]),
    call(Op::WalkActorToObject, 0x36, 0xc0, &[B, W]),
    call(Op::StartObject, 0x37, 0xc0, &[W, B, L]),
    compare(Op::IsLessEqual, 0x38, ">="),
    update(Op::Subtract, 0x3a, "-=", true),
    store(Op::GetActorScale, 0x3b, 0x80, &[B]),
    call(Op::StopSound, 0x3c, 0x80, &[B]),
    store(Op::FindInventory, 0x3d, 0xc0, &[B, B]),
    call(Op::DrawBox, 0x3f, 0xc0, &[W, W, M, W, W, B]),
    call(Op::Cutscene, 0x40, 0x00, &[L]),
    call(Op::ChainScript, 0x42, 0x80, &[B, L]),
    store(Op::GetActorX, 0x43, 0x80, &[W]),
    compare(Op::IsLess, 0x44, ">"),
    update(Op::Increment, 0x46, "++", false),
    compare(Op::IsEqual, 0x48, "=="),
    call(Op::SoundKludge, 0x4c, 0x00, &[L]),
    // 0x4F and 0xCF only: a literal state would collide with getObjectState
    spec(Op::IfState, 0x4f, 0x80, Form::Predicate(&[W, B])),
    call(Op::PickupObjectOld, 0x50, 0x80, &[W]),
    call(Op::ActorFollowCamera, 0x52, 0x80, &[B]),
    call(Op::SetObjectName, 0x54, 0x80, &[W, T]),
    store(Op::GetActorMoving, 0x56, 0x80, &[B]),
    update(Op::Or, 0x57, "|=", true),
    spec(Op::Override, 0x58, 0x00, Form::Override),
    update(Op::Add, 0x5a, "+=", true),
    update(Op::Divide, 0x5b, "/=", true),
    select(Op::OldRoomEffect, 0x5c, &OLD_ROOM_EFFECT).ignoring(0x80),
    call(Op::SetClass, 0x5d, 0x80, &[W, L]),
    call(Op::FreezeScripts, 0x60, 0x80, &[B]),
    call(Op::StopScript, 0x62, 0x80, &[B]),
    store(Op::GetActorFacing, 0x63, 0x80, &[B]),
    store(Op::GetClosestObjActor, 0x66, 0x80, &[W]),
    store(Op::GetStringWidth, 0x67, 0x80, &[B]),
    store(Op::IsScriptRunning, 0x68, 0x80, &[B]),
    call(Op::Debug, 0x6b, 0x80, &[W]),
    store(Op::GetActorWidth, 0x6c, 0x80, &[B]),
    call(Op::StopObjectScript, 0x6e, 0x80, &[W]),
    call(Op::Lights, 0x70, 0x80, &[B, RB, RB]),
    store(Op::GetActorCostume, 0x71, 0x80, &[B]),
    call(Op::LoadRoom, 0x72, 0x80, &[B]),
    compare(Op::IsGreater, 0x78, "<"),
    spec(Op::VerbOps, 0x7a, 0x80, Form::Block { leading: &[B], table: &VERB_OPS }),
    store(Op::GetActorWalkBox, 0x7b, 0x80, &[B]),
    store(Op::IsSoundRunning, 0x7c, 0x80, &[B]),
    call(Op::BreakHere, 0x80, 0x00, &[]),
    select(Op::SystemOps, 0x98, &SYSTEM_OPS),
    call(Op::StopObjectCode2, 0xa0, 0x00, &[]),
    spec(Op::NotEqualZero, 0xa8, 0x00, Form::Test { negated: false }),
    select(Op::SaveRestoreVerbs, 0xab, &SAVE_RESTORE_VERBS),
    spec(Op::Expression, 0xac, 0x00, Form::Expression),
    select(Op::Wait, 0xae, &WAIT_OPS),
    call(Op::EndCutscene, 0xc0, 0x00, &[]),
    update(Op::Decrement, 0xc6, "--", false),
    spec(Op::PseudoRoom, 0xcc, 0x00, Form::PseudoRoom),
    spec(Op::PrintEgo, 0xd8, 0x00, Form::Block { leading: &[], table: &PRINT_EGO_OPS }),
];

/// Where a statement name resolves to.
#[derive(Debug, Clone, Copy)]
pub enum NamedEntry {
    Opcode(&'static OpcodeSpec),
    Setter(&'static OpcodeSpec, &'static SubOp),
}

/// Byte-indexed dispatch table built from [`OPCODE_SPECS`].
pub struct OpcodeTable {
    by_byte: [Option<&'static OpcodeSpec>; 256],
    by_op: IndexMap<Op, &'static OpcodeSpec>,
    by_name: IndexMap<&'static str, NamedEntry>,
}

lazy_static! {
    static ref STANDARD: OpcodeTable = match OpcodeTable::build(OPCODE_SPECS) {
        Ok(table) => table,
        Err(e) => panic!("v5 opcode table is inconsistent: {}", e),
    };
}

impl OpcodeTable {
    pub fn standard() -> &'static OpcodeTable {
        &STANDARD
    }

    pub fn build(specs: &'static [OpcodeSpec]) -> Result<Self, ScummError> {
        let mut by_byte: [Option<&'static OpcodeSpec>; 256] = [None; 256];
        let mut by_op = IndexMap::new();
        let mut by_name = IndexMap::new();

        for spec in specs {
            for byte in expand_mask(spec.base, spec.mask | spec.ignored) {
                if let Some(existing) = by_byte[byte as usize] {
                    return Err(ScummError::DuplicateOpcode(
                        byte,
                        existing.op.name(),
                        spec.op.name(),
                    ));
                }
                by_byte[byte as usize] = Some(spec);
            }
            by_op.insert(spec.op, spec);

            match spec.form {
                Form::Select(table) => {
                    for entry in table.entries {
                        by_name.insert(entry.name, NamedEntry::Setter(spec, entry));
                    }
                }
                _ => {
                    by_name.insert(spec.op.name(), NamedEntry::Opcode(spec));
                }
            }
        }

        debug!(
            "opcode table: {} mnemonics, {} opcode bytes",
            specs.len(),
            by_byte.iter().filter(|s| s.is_some()).count()
        );
        Ok(OpcodeTable {
            by_byte,
            by_op,
            by_name,
        })
    }

    pub fn lookup(&self, byte: u8) -> Option<&'static OpcodeSpec> {
        self.by_byte[byte as usize]
    }

    pub fn spec(&self, op: Op) -> Option<&'static OpcodeSpec> {
        self.by_op.get(&op).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<NamedEntry> {
        self.by_name.get(name).copied()
    }

    /// First registered mnemonic whose form satisfies `pred`.
    pub fn find<F>(&self, pred: F) -> Option<&'static OpcodeSpec>
    where
        F: Fn(&Form) -> bool,
    {
        self.by_op.values().copied().find(|spec| pred(&spec.form))
    }

    /// Concrete opcode byte for `op` with the given mode and flag bits.
    ///
    /// `significant` marks the bits the caller controls; the chosen byte
    /// must agree with `bits` on all of them.
    pub fn opcode_for(&self, op: Op, bits: u8, significant: u8) -> Result<u8, ScummError> {
        let spec = self.spec(op).ok_or_else(|| {
            ScummError::InvalidArgument(format!("{} is not registered", op.name()), 0)
        })?;
        let byte = spec.base | bits;
        match self.lookup(byte) {
            Some(found) if found.op == op && byte & significant == bits & significant => Ok(byte),
            _ => Err(ScummError::InvalidArgument(
                format!(
                    "{} has no opcode for addressing bits 0x{:02x}",
                    op.name(),
                    bits
                ),
                0,
            )),
        }
    }
}

/// Every byte `base | subset` for subsets of `mask`.
pub fn expand_mask(base: u8, mask: u8) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut subset: u8 = 0;
    loop {
        bytes.push(base | subset);
        if subset == mask {
            break;
        }
        subset = subset.wrapping_sub(mask) & mask;
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_expand_mask() {
        assert_eq!(expand_mask(0x18, 0x00), vec![0x18]);
        assert_eq!(expand_mask(0x07, 0xc0), vec![0x07, 0x47, 0x87, 0xc7]);
        assert_eq!(expand_mask(0x01, 0xe0).len(), 8);
    }

    #[test]
    fn test_standard_table_builds() {
        let table = OpcodeTable::standard();
        assert_eq!(table.lookup(0x01).unwrap().op, Op::PutActor);
        assert_eq!(table.lookup(0xe1).unwrap().op, Op::PutActor);
        assert_eq!(table.lookup(0xc6).unwrap().op, Op::Decrement);
        assert_eq!(table.lookup(0x46).unwrap().op, Op::Increment);
        assert_eq!(table.lookup(0xcf).unwrap().op, Op::IfState);
        assert_eq!(table.lookup(0x8f).unwrap().op, Op::GetObjectState);
    }

    #[test]
    fn test_ignored_bits_register_aliases() {
        let table = OpcodeTable::standard();
        let aliases = [
            (0x45, Op::DrawObject),
            (0xc5, Op::DrawObject),
            (0x53, Op::ActorOps),
            (0xd3, Op::ActorOps),
            (0x73, Op::RoomOps),
            (0xb3, Op::RoomOps),
            (0xf3, Op::RoomOps),
            (0x8c, Op::ResourceRoutines),
            (0xb0, Op::MatrixOps),
            (0xdc, Op::OldRoomEffect),
        ];
        for (byte, op) in aliases {
            assert_eq!(table.lookup(byte).map(|s| s.op), Some(op), "0x{:02x}", byte);
        }
        assert_eq!(table.opcode_for(Op::RoomOps, 0xc0, 0xc0).unwrap(), 0xf3);
        assert!(table.lookup(0xa7).is_none());
    }

    #[test]
    fn test_no_setter_is_named_opcode() {
        for spec in OPCODE_SPECS {
            if let Form::Select(table) | Form::Block { table, .. } = spec.form {
                assert!(table.by_name("opcode").is_none(), "{}", table.family);
            }
        }
    }

    #[test]
    fn test_duplicate_registration_is_fatal() {
        static CLASH: &[OpcodeSpec] = &[
            call(Op::PutActor, 0x01, 0xe0, &[B, W, W]),
            call(Op::StartMusic, 0x81, 0x00, &[B]),
        ];
        match OpcodeTable::build(CLASH) {
            Err(ScummError::DuplicateOpcode(0x81, "putActor", "startMusic")) => {}
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("duplicate accepted"),
        }
    }

    #[test]
    fn test_statement_names_unique() {
        let mut seen = HashSet::new();
        for spec in OPCODE_SPECS {
            match spec.form {
                Form::Select(table) => {
                    for entry in table.entries {
                        assert!(seen.insert(entry.name), "{} repeated", entry.name);
                    }
                }
                _ => assert!(seen.insert(spec.op.name()), "{} repeated", spec.op.name()),
            }
        }
    }

    #[test]
    fn test_sub_op_codes_fit_low_bits() {
        for spec in OPCODE_SPECS {
            let table = match spec.form {
                Form::Select(table) | Form::Block { table, .. } => table,
                _ => continue,
            };
            for entry in table.entries {
                assert!(entry.code < 0x20, "{}.{}", table.family, entry.name);
                let mode_params = entry.params.iter().take_while(|p| **p != M);
                assert!(mode_params.filter(|p| p.uses_mode_bit()).count() <= 3);
            }
        }
    }

    #[test]
    fn test_opcode_for_rejects_missing_variant() {
        let table = OpcodeTable::standard();
        assert_eq!(table.opcode_for(Op::PutActor, 0xa0, 0xe0).unwrap(), 0xa1);
        assert_eq!(table.opcode_for(Op::IfState, 0xc0, 0xc0).unwrap(), 0xcf);
        // a literal state would need the 0x40 bit clear
        assert!(table.opcode_for(Op::IfState, 0x80, 0xc0).is_err());
        assert!(table.opcode_for(Op::StopMusic, 0x80, 0x80).is_err());
    }
}
