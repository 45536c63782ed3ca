//! 保护计划性质验证
//!
//! # 核心目标 (Why)
//! - 在 {保护顺序} × {角色} × {绑定开关} × {派生密钥} 的组合空间上随机抽样，
//!   断言计划的结构性质始终成立，而不是逐个枚举场景。
//!
//! # 断言 (What)
//! 1. 计划中第一个签名/加密动作与声明的保护顺序一致；
//! 2. 派生密钥要求只产出派生动作，反之亦然；
//! 3. `encrypt_signature` 时加密描述符恰好提及一次签名元素；
//! 4. 签名确认标记至多出现一次，且只在响应方出现；
//! 5. 请求方的令牌总是新生成，响应方的令牌总是提取而来。

use std::sync::Arc;
use std::time::SystemTime;

use proptest::prelude::*;

use spark_wss::names;
use spark_wss::test_stubs::StaticMessageParts;
use spark_wss::{
    Action, EngineConfig, EngineResult, HandlerResult, InMemoryTokenStore, ManualClock,
    MessageContext, Modifier, OutboundTokens, ProtectionOrder, ProtectionOrderCoordinator, QName,
    RecordedAssertions, Role, SecurePart, SymmetricBinding, TokenOrigin, TokenPolicy,
};

#[derive(Clone, Debug)]
struct Scenario {
    order: ProtectionOrder,
    role: Role,
    encrypt_signature: bool,
    include_timestamp: bool,
    protect_tokens: bool,
    derived_keys: bool,
    signed_headers: usize,
    encrypted_parts: usize,
}

fn scenarios() -> impl Strategy<Value = Scenario> {
    (
        prop_oneof![
            Just(ProtectionOrder::EncryptBeforeSigning),
            Just(ProtectionOrder::SignBeforeEncrypting)
        ],
        prop_oneof![Just(Role::Requestor), Just(Role::Responder)],
        any::<[bool; 4]>(),
        0usize..3,
        1usize..3,
    )
        .prop_map(|(order, role, flags, signed_headers, encrypted_parts)| Scenario {
            order,
            role,
            encrypt_signature: flags[0],
            include_timestamp: flags[1],
            protect_tokens: flags[2],
            derived_keys: flags[3],
            signed_headers,
            encrypted_parts,
        })
}

fn binding_for(scenario: &Scenario) -> SymmetricBinding {
    let mut token = TokenPolicy::x509();
    if scenario.derived_keys {
        token = token.require_derived_keys();
    }
    let mut binding =
        SymmetricBinding::with_protection_token(token).protection_order_is(scenario.order);
    if scenario.encrypt_signature {
        binding = binding.encrypt_signature();
    }
    if scenario.include_timestamp {
        binding = binding.include_timestamp();
    }
    if scenario.protect_tokens {
        binding = binding.protect_tokens();
    }
    binding
}

fn message_parts(scenario: &Scenario) -> StaticMessageParts {
    let signed = (0..scenario.signed_headers)
        .map(|i| SecurePart::signed(QName::new("urn:example:headers", format!("H{i}"))))
        .collect();
    let encrypted = (0..scenario.encrypted_parts)
        .map(|i| {
            SecurePart::encrypted(
                QName::new(names::NS_SOAP11, format!("{}{i}", names::LN_BODY)),
                Modifier::Content,
            )
        })
        .collect();
    StaticMessageParts::new(signed, encrypted)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn plans_respect_order_role_and_flags(scenario in scenarios()) {
        let clock = Arc::new(ManualClock::new(SystemTime::UNIX_EPOCH));
        let store = Arc::new(InMemoryTokenStore::new(clock.clone()));
        let coordinator = ProtectionOrderCoordinator::new(store, clock, EngineConfig::default());
        let binding = binding_for(&scenario);
        let parts = message_parts(&scenario);
        let inbound = vec![HandlerResult::new(vec![EngineResult::encrypted_key(
            "EK-inbound",
            vec![3; 32],
            vec![4; 256],
        )])];
        let outbound = OutboundTokens::new();
        let assertions = RecordedAssertions::new();
        let ctx = MessageContext::new(&parts, &outbound, &assertions).with_inbound(&inbound);

        let outcome = coordinator.run(&binding, scenario.role, &ctx).expect("no fault");
        let plan = outcome.plan().expect("x509 bindings always plan");
        prop_assert!(assertions.is_empty());

        let protecting: Vec<Action> = plan
            .actions()
            .iter()
            .copied()
            .filter(|a| a.is_signature() || a.is_encryption())
            .collect();
        prop_assert!(!protecting.is_empty());
        match scenario.order {
            ProtectionOrder::EncryptBeforeSigning => prop_assert!(protecting[0].is_encryption()),
            ProtectionOrder::SignBeforeEncrypting => {
                // 请求方在签名列表为空时跳过签名阶段。
                if protecting[0].is_encryption() {
                    prop_assert_eq!(scenario.role, Role::Requestor);
                    prop_assert!(plan.signature_parts().is_empty());
                }
            }
        }

        let derived = protecting
            .iter()
            .all(|a| matches!(a, Action::SignatureDerived | Action::EncryptDerived));
        let plain = protecting
            .iter()
            .all(|a| matches!(a, Action::Signature | Action::Encrypt));
        let uniform_key_kind = if scenario.derived_keys { derived } else { plain };
        prop_assert!(uniform_key_kind);

        let signature_element =
            format!("{{Element}}{{{}}}{};", names::NS_DSIG, names::LN_SIGNATURE);
        let mentions = plan.encryption_parts().matches(&signature_element).count();
        prop_assert_eq!(mentions, usize::from(scenario.encrypt_signature));

        let confirmations = plan.signature_parts().matches("SignatureConfirmation;").count();
        match scenario.role {
            Role::Requestor => prop_assert_eq!(confirmations, 0),
            Role::Responder => prop_assert_eq!(confirmations, 1),
        }

        let expected_origin = match scenario.role {
            Role::Requestor => TokenOrigin::Generated,
            Role::Responder => TokenOrigin::Extracted,
        };
        prop_assert_eq!(plan.token_origin(), Some(expected_origin));
    }
}
