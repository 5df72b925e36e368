//! The proof transaction and its byte format.
//!
//! A proof is the transaction *kind* of a programmable ledger transaction:
//! a list of inputs and a single call into the namespace's
//! `access_policy` module. It carries no sender and no gas; it is never
//! signed or executed, only dry-run by key servers.
//!
//! ```text
//! ProofTx   = { 0: version, 1: [Input], 2: [Call] }
//! Input     = { 0: 0, 1: bytes }          ; pure value
//!           | { 0: 1, 1: object id }      ; object reference
//! Call      = { 0: package, 1: module, 2: function, 3: [input index] }
//! ```
//!
//! All maps use canonical CBOR, so a transaction has exactly one byte
//! representation.

use ciborium::value::Value;

use sigil_core::canonical::{self, bytes, int_map, text, uint, CanonicalMap};
use sigil_core::{Namespace, ObjectId, ResourceId};

use crate::error::{ProofError, Result};
use crate::ids::{CreatorCapId, SubscriptionId};

/// Current proof transaction format version.
pub const PROOF_VERSION: u64 = 1;

/// Module every policy function lives in.
pub const POLICY_MODULE: &str = "access_policy";

const INPUT_PURE: u64 = 0;
const INPUT_OBJECT: u64 = 1;

/// The two access policy entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyFunction {
    ApproveCreator,
    ApproveSubscriber,
}

impl PolicyFunction {
    pub const fn name(self) -> &'static str {
        match self {
            Self::ApproveCreator => "approve_creator",
            Self::ApproveSubscriber => "approve_subscriber",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "approve_creator" => Some(Self::ApproveCreator),
            "approve_subscriber" => Some(Self::ApproveSubscriber),
            _ => None,
        }
    }
}

/// A transaction input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallArg {
    /// A plain value, already serialized.
    Pure(Vec<u8>),
    /// A reference to an on-chain object.
    Object(ObjectId),
}

/// A call into a policy package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyCall {
    pub package: Namespace,
    pub module: String,
    pub function: String,
    /// Indices into the transaction's inputs.
    pub arguments: Vec<u16>,
}

/// An unsigned, unexecuted policy-approval transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofTx {
    inputs: Vec<CallArg>,
    calls: Vec<PolicyCall>,
}

/// What a proof asks the policy to approve, as read back by a verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofClaim {
    pub namespace: Namespace,
    pub resource_id: ResourceId,
    pub authorization: ClaimedAuthorization,
}

/// The authorization object a proof presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimedAuthorization {
    Creator(CreatorCapId),
    Subscriber {
        subscription: SubscriptionId,
        clock: ObjectId,
    },
}

impl ClaimedAuthorization {
    pub fn function(&self) -> PolicyFunction {
        match self {
            Self::Creator(_) => PolicyFunction::ApproveCreator,
            Self::Subscriber { .. } => PolicyFunction::ApproveSubscriber,
        }
    }
}

impl ProofTx {
    /// `approve_creator(id, cap)`.
    pub fn approve_creator(namespace: Namespace, resource: &ResourceId, cap: CreatorCapId) -> Self {
        Self::single_call(
            namespace,
            PolicyFunction::ApproveCreator,
            vec![
                CallArg::Pure(resource.as_bytes().to_vec()),
                CallArg::Object(*cap.object_id()),
            ],
        )
    }

    /// `approve_subscriber(id, subscription, clock)`.
    pub fn approve_subscriber(
        namespace: Namespace,
        resource: &ResourceId,
        subscription: SubscriptionId,
    ) -> Self {
        Self::single_call(
            namespace,
            PolicyFunction::ApproveSubscriber,
            vec![
                CallArg::Pure(resource.as_bytes().to_vec()),
                CallArg::Object(*subscription.object_id()),
                CallArg::Object(ObjectId::CLOCK),
            ],
        )
    }

    fn single_call(namespace: Namespace, function: PolicyFunction, inputs: Vec<CallArg>) -> Self {
        let arguments = (0..inputs.len() as u16).collect();
        Self {
            inputs,
            calls: vec![PolicyCall {
                package: namespace,
                module: POLICY_MODULE.to_string(),
                function: function.name().to_string(),
                arguments,
            }],
        }
    }

    pub fn inputs(&self) -> &[CallArg] {
        &self.inputs
    }

    pub fn calls(&self) -> &[PolicyCall] {
        &self.calls
    }

    /// Package of the first call, which is the namespace the proof targets.
    pub fn namespace(&self) -> Option<&Namespace> {
        self.calls.first().map(|call| &call.package)
    }

    /// Serialize to the ledger transaction byte format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let inputs = self
            .inputs
            .iter()
            .map(|input| match input {
                CallArg::Pure(data) => int_map(vec![(0, uint(INPUT_PURE)), (1, bytes(data))]),
                CallArg::Object(id) => {
                    int_map(vec![(0, uint(INPUT_OBJECT)), (1, bytes(id.as_bytes()))])
                }
            })
            .collect();

        let calls = self
            .calls
            .iter()
            .map(|call| {
                int_map(vec![
                    (0, bytes(call.package.as_bytes())),
                    (1, text(&call.module)),
                    (2, text(&call.function)),
                    (
                        3,
                        Value::Array(
                            call.arguments
                                .iter()
                                .map(|&i| uint(u64::from(i)))
                                .collect(),
                        ),
                    ),
                ])
            })
            .collect();

        let value = int_map(vec![
            (0, uint(PROOF_VERSION)),
            (1, Value::Array(inputs)),
            (2, Value::Array(calls)),
        ]);
        Ok(canonical::encode_canonical(&value)?)
    }

    /// Parse transaction bytes produced by [`ProofTx::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let value = canonical::decode_canonical(data)?;
        let map = CanonicalMap::new(&value, "proof")?;

        let version = map.uint(0, "version")?;
        if version != PROOF_VERSION {
            return Err(ProofError::Malformed(format!(
                "unsupported proof version {version}"
            )));
        }

        let mut inputs = Vec::new();
        for item in map.array(1, "inputs")? {
            let input = CanonicalMap::new(item, "proof input")?;
            let arg = match input.uint(0, "input kind")? {
                INPUT_PURE => CallArg::Pure(input.bytes(1, "pure value")?.to_vec()),
                INPUT_OBJECT => {
                    CallArg::Object(ObjectId::from_bytes(input.bytes32(1, "object id")?))
                }
                other => {
                    return Err(ProofError::Malformed(format!("unknown input kind {other}")))
                }
            };
            inputs.push(arg);
        }

        let mut calls = Vec::new();
        for item in map.array(2, "calls")? {
            let call = CanonicalMap::new(item, "proof call")?;
            let mut arguments = Vec::new();
            for arg in call.array(3, "arguments")? {
                let index = match arg {
                    Value::Integer(i) => u16::try_from(i128::from(*i)).ok(),
                    _ => None,
                };
                match index {
                    Some(i) if usize::from(i) < inputs.len() => arguments.push(i),
                    _ => {
                        return Err(ProofError::Malformed(
                            "argument does not reference an input".into(),
                        ))
                    }
                }
            }
            calls.push(PolicyCall {
                package: Namespace::from_bytes(call.bytes32(0, "package")?),
                module: call.text(1, "module")?.to_string(),
                function: call.text(2, "function")?.to_string(),
                arguments,
            });
        }

        Ok(Self { inputs, calls })
    }

    /// Interpret the transaction as exactly one policy approval.
    pub fn claim(&self) -> Result<ProofClaim> {
        let [call] = self.calls.as_slice() else {
            return Err(ProofError::Malformed(format!(
                "expected exactly one call, found {}",
                self.calls.len()
            )));
        };
        if call.module != POLICY_MODULE {
            return Err(ProofError::Malformed(format!(
                "call targets module {}, not {POLICY_MODULE}",
                call.module
            )));
        }
        let function = PolicyFunction::from_name(&call.function).ok_or_else(|| {
            ProofError::Malformed(format!("{} is not a policy function", call.function))
        })?;

        let args: Vec<&CallArg> = call
            .arguments
            .iter()
            .map(|&i| &self.inputs[usize::from(i)])
            .collect();

        let resource_id = match args.first() {
            Some(CallArg::Pure(id)) => {
                let id: [u8; 32] = id.as_slice().try_into().map_err(|_| {
                    ProofError::Malformed("identity argument is not 32 bytes".into())
                })?;
                ResourceId::from_bytes(id)
            }
            _ => return Err(ProofError::Malformed("missing identity argument".into())),
        };

        let authorization = match (function, &args[1..]) {
            (PolicyFunction::ApproveCreator, [CallArg::Object(cap)]) => {
                ClaimedAuthorization::Creator(CreatorCapId::new(*cap))
            }
            (PolicyFunction::ApproveSubscriber, [CallArg::Object(sub), CallArg::Object(clock)]) => {
                ClaimedAuthorization::Subscriber {
                    subscription: SubscriptionId::new(*sub),
                    clock: *clock,
                }
            }
            (function, _) => {
                return Err(ProofError::Malformed(format!(
                    "wrong arguments for {}",
                    function.name()
                )))
            }
        };

        Ok(ProofClaim {
            namespace: call.package,
            resource_id,
            authorization,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namespace() -> Namespace {
        Namespace::from_bytes([0xaa; 32])
    }

    fn resource() -> ResourceId {
        ResourceId::from_bytes([0x11; 32])
    }

    #[test]
    fn test_creator_call_shape() {
        let cap = CreatorCapId::parse("cap_0x5").unwrap();
        let tx = ProofTx::approve_creator(namespace(), &resource(), cap);

        assert_eq!(tx.inputs().len(), 2);
        assert_eq!(tx.calls()[0].function, "approve_creator");
        assert_eq!(tx.calls()[0].module, "access_policy");
        assert_eq!(tx.calls()[0].arguments, vec![0, 1]);
        assert_eq!(tx.namespace(), Some(&namespace()));
    }

    #[test]
    fn test_subscriber_call_passes_clock() {
        let sub = SubscriptionId::parse("sub_0x9").unwrap();
        let tx = ProofTx::approve_subscriber(namespace(), &resource(), sub);

        assert_eq!(tx.inputs()[2], CallArg::Object(ObjectId::CLOCK));

        let claim = tx.claim().unwrap();
        assert_eq!(claim.resource_id, resource());
        assert_eq!(
            claim.authorization,
            ClaimedAuthorization::Subscriber {
                subscription: sub,
                clock: ObjectId::CLOCK,
            }
        );
    }

    #[test]
    fn test_bytes_parse_back_to_same_claim() {
        let cap = CreatorCapId::parse("cap_0xbeef").unwrap();
        let tx = ProofTx::approve_creator(namespace(), &resource(), cap);

        let encoded = tx.to_bytes().unwrap();
        let decoded = ProofTx::from_bytes(&encoded).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(
            decoded.claim().unwrap().authorization,
            ClaimedAuthorization::Creator(cap)
        );
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let sub = SubscriptionId::parse("sub_0x1").unwrap();
        let a = ProofTx::approve_subscriber(namespace(), &resource(), sub);
        let b = ProofTx::approve_subscriber(namespace(), &resource(), sub);
        assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
    }

    #[test]
    fn test_rejects_garbage_bytes() {
        assert!(ProofTx::from_bytes(b"definitely not cbor").is_err());
        assert!(ProofTx::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_claim_rejects_foreign_module() {
        let cap = CreatorCapId::parse("cap_0x5").unwrap();
        let mut tx = ProofTx::approve_creator(namespace(), &resource(), cap);
        tx.calls[0].module = "marketplace".into();
        assert!(matches!(tx.claim(), Err(ProofError::Malformed(_))));
    }

    #[test]
    fn test_claim_rejects_mismatched_arguments() {
        let cap = CreatorCapId::parse("cap_0x5").unwrap();
        let mut tx = ProofTx::approve_creator(namespace(), &resource(), cap);
        tx.calls[0].function = "approve_subscriber".into();
        assert!(matches!(tx.claim(), Err(ProofError::Malformed(_))));
    }
}
