//! Per-tool field allow-lists.
//!
//! A known tool passes on exactly the fields listed here; anything else in
//! its parameter object is dropped.

pub const MAX_DESCRIPTION: usize = 256;
pub const MAX_RESULT: usize = 1024;
pub const MAX_QUERY: usize = 128;
pub const MAX_ADDRESS: usize = 44;
pub const MAX_IDENTIFIER: usize = 32;
pub const MAX_DEFAULT: usize = 256;

pub const TASK_ROLES: &[&str] = &["requester", "provider"];
pub const TASK_STATUSES: &[&str] = &["open", "submitted", "completed", "disputed", "expired"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// Free text, rejected past `max_len` characters.
    Text { max_len: usize },
    /// Ledger public key or derived account address.
    PublicKey,
    /// JSON number or numeric string within `[min, max]`.
    Number { min: f64, max: f64 },
    /// Case-insensitive member of a closed set, normalized to lower case.
    Enum(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn required(name: &'static str, kind: FieldKind) -> FieldRule {
    FieldRule {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: FieldKind) -> FieldRule {
    FieldRule {
        name,
        kind,
        required: false,
    }
}

const DESCRIPTION: FieldKind = FieldKind::Text {
    max_len: MAX_DESCRIPTION,
};
const RESULT: FieldKind = FieldKind::Text {
    max_len: MAX_RESULT,
};
const IDENTIFIER: FieldKind = FieldKind::Text {
    max_len: MAX_IDENTIFIER,
};

const SEARCH_SERVICES: &[FieldRule] = &[
    optional("query", FieldKind::Text { max_len: MAX_QUERY }),
    optional("maxPrice", FieldKind::Number { min: 0.0, max: 1000.0 }),
    optional("minReputation", FieldKind::Number { min: 0.0, max: 1_000_000.0 }),
];
const GET_SERVICE: &[FieldRule] = &[required("servicePda", FieldKind::PublicKey)];
const CREATE_TASK: &[FieldRule] = &[
    required("servicePda", FieldKind::PublicKey),
    required("description", DESCRIPTION),
    // At most seven days.
    optional("deadlineMinutes", FieldKind::Number { min: 1.0, max: 10_080.0 }),
];
const TASK_ONLY: &[FieldRule] = &[required("taskPda", FieldKind::PublicKey)];
const LIST_MY_TASKS: &[FieldRule] = &[
    optional("role", FieldKind::Enum(TASK_ROLES)),
    optional("status", FieldKind::Enum(TASK_STATUSES)),
];
const SUBMIT_RESULT: &[FieldRule] = &[
    required("taskPda", FieldKind::PublicKey),
    required("result", RESULT),
];
const SCAN_WALLET: &[FieldRule] = &[required("walletAddress", FieldKind::PublicKey)];
const NO_FIELDS: &[FieldRule] = &[];
const CREATE_TEAM_TASK: &[FieldRule] = &[
    required("teamId", IDENTIFIER),
    required("onChainTaskPda", FieldKind::PublicKey),
    required("description", DESCRIPTION),
];
const TEAM_TASK_ONLY: &[FieldRule] = &[required("teamTaskId", IDENTIFIER)];
const ASSIGN_SUBTASK: &[FieldRule] = &[
    required("teamTaskId", IDENTIFIER),
    required("assignedTo", FieldKind::PublicKey),
    required("description", DESCRIPTION),
];
const COMPLETE_SUBTASK: &[FieldRule] = &[
    required("teamTaskId", IDENTIFIER),
    required("subtaskId", IDENTIFIER),
    required("result", RESULT),
];
const SUBMIT_TEAM_RESULT: &[FieldRule] = &[
    required("teamTaskId", IDENTIFIER),
    required("aggregatedResult", RESULT),
];

/// Field rules for a tool name without any external prefix.
pub fn tool_rules(tool: &str) -> Option<&'static [FieldRule]> {
    let rules = match tool {
        "search_services" => SEARCH_SERVICES,
        "get_service" => GET_SERVICE,
        "create_task" => CREATE_TASK,
        "get_task" | "accept_result" | "dispute_task" => TASK_ONLY,
        "list_my_tasks" => LIST_MY_TASKS,
        "submit_result" | "submit_result_zk" => SUBMIT_RESULT,
        "scan_wallet" => SCAN_WALLET,
        "get_balance" => NO_FIELDS,
        "create_team_task" => CREATE_TEAM_TASK,
        "get_team_task" | "distribute_payment" => TEAM_TASK_ONLY,
        "assign_subtask" => ASSIGN_SUBTASK,
        "complete_subtask" => COMPLETE_SUBTASK,
        "submit_team_result" => SUBMIT_TEAM_RESULT,
        _ => return None,
    };
    Some(rules)
}
