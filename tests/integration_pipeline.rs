// tests/integration_pipeline.rs
//
// End-to-end flow inference properties over whole documents.

mod common;

use std::collections::HashSet;

use bpmn_lite::{ConnectionKind, DiagnosticKind};
use common::*;

#[test]
fn test_gateway_branch_rule() {
    let result = parse_ok(
        "@Lane\ntask1\ntask2\n?Gateway\n  +success\n  -failure\ntask3",
    );
    assert_eq!(
        sequence(&result),
        vec![
            edge("lane_task1", "lane_task2"),
            edge("lane_task2", "lane_gateway"),
            edge("lane_gateway", "lane_success"),
            edge("lane_gateway", "lane_failure"),
            edge("lane_success", "lane_task3"),
        ]
    );
    let labels: Vec<_> = result
        .connections
        .iter()
        .filter_map(|c| c.label.as_deref())
        .collect();
    assert_eq!(labels, vec!["Yes", "No"]);
}

#[test]
fn test_gateway_branch_rule_with_notes_inside_branches() {
    let result = parse_ok(
        "@Lane\ntask1\ntask2\n?Gateway\n  +success\n    \"checked twice\"\n    #Receipt success\n  -failure\n    log failure\ntask3",
    );
    assert_eq!(
        sequence(&result),
        vec![
            edge("lane_task1", "lane_task2"),
            edge("lane_task2", "lane_gateway"),
            edge("lane_gateway", "lane_success"),
            edge("lane_gateway", "lane_failure"),
            edge("lane_failure", "lane_log_failure"),
            edge("lane_success", "lane_task3"),
        ]
    );
    assert!(result.diagnostics.is_empty());
}

#[test]
fn test_nested_gateways_never_skip_a_boundary() {
    let result = parse_ok(
        "@A\nprep\n?Outer\n  +ok\n  -bad\n    ?Retry\n      +again\n      -quit\nafter\n@B\nother",
    );
    let flows = sequence(&result);
    assert_eq!(
        flows,
        vec![
            edge("a_prep", "a_outer"),
            edge("a_outer", "a_ok"),
            edge("a_outer", "a_bad"),
            edge("a_bad", "a_retry"),
            edge("a_retry", "a_again"),
            edge("a_retry", "a_quit"),
            edge("a_ok", "a_after"),
            edge("a_after", "b_other"),
        ]
    );
    assert_no_dangling_edges(&result);
}

#[test]
fn test_lane_switch_rule() {
    let result = parse_ok("@Customer\ntask1\ntask2\n@System\ntask3\ntask4");
    let cross: Vec<_> = sequence(&result)
        .into_iter()
        .filter(|e| *e == edge("customer_task2", "system_task3"))
        .collect();
    assert_eq!(cross.len(), 1);
    assert!(sequence(&result).contains(&edge("system_task3", "system_task4")));
}

#[test]
fn test_lane_with_open_thread_gets_no_cross_lane_edge() {
    let result = parse_ok("@A\na1\n@B\nb1\n@A\na2\n@B\nb2");
    assert_eq!(
        sequence(&result),
        vec![
            edge("a_a1", "b_b1"),
            edge("a_a1", "a_a2"),
            edge("b_b1", "b_b2"),
        ]
    );
}

#[test]
fn test_forward_reference_adds_edge() {
    let result = parse_ok("@Customer\nplace order -> kokoko\n@System\nkokoko");
    let edges = sequence(&result);
    assert!(edges.contains(&edge("customer_place_order", "system_kokoko")));
    // Inferred and referenced flow coincide here, so the edge appears once.
    assert_eq!(edges.len(), 1);
    assert!(result.diagnostics.is_empty());
}

#[test]
fn test_forward_reference_is_additive() {
    let result = parse_ok("@A\nplace order -> kokoko\nwait\n@B\nkokoko");
    let edges = sequence(&result);
    assert!(edges.contains(&edge("a_place_order", "a_wait")));
    assert!(edges.contains(&edge("a_wait", "b_kokoko")));
    assert!(edges.contains(&edge("a_place_order", "b_kokoko")));
}

#[test]
fn test_missing_forward_target_is_not_fatal() {
    let result = parse_ok("@A\nplace order -> kokoko\nship");
    assert_eq!(sequence(&result), vec![edge("a_place_order", "a_ship")]);
    assert_eq!(
        diagnostic_kinds(&result),
        vec![DiagnosticKind::UnresolvedForwardReference]
    );
}

#[test]
fn test_message_pairing() {
    let result = parse_ok("@A\nsend: Payment\n@B\nreceive: Payment\nreceive: Payment");
    assert_eq!(
        edges_of(&result, ConnectionKind::MessageFlow),
        vec![edge("a_send_payment", "b_receive_payment")]
    );
    let message = result
        .connections
        .iter()
        .find(|c| c.kind == ConnectionKind::MessageFlow)
        .unwrap();
    assert_eq!(message.label.as_deref(), Some("Payment"));
    assert!(diagnostic_kinds(&result).contains(&DiagnosticKind::UnmatchedMessage));
}

#[test]
fn test_ids_unique_with_repeated_labels() {
    let result = parse_ok("@A\nreview\nreview\n@B\nreview\n@A\nreview\n!End\n!End");
    let ids: Vec<_> = result.document.elements().iter().map(|e| e.id.clone()).collect();
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(ids.len(), unique.len());
    assert_eq!(
        ids,
        vec!["a_review", "a_review_2", "b_review", "a_review_3", "a_end", "a_end_2"]
    );
}

#[test]
fn test_no_dangling_edges_in_a_full_process() {
    let result = parse_ok(ORDER_PROCESS);
    assert_no_dangling_edges(&result);
    let ids: HashSet<_> = result.connections.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids.len(), result.connections.len());
}

#[test]
fn test_parse_is_deterministic() {
    let first = bpmn_lite::compile(ORDER_PROCESS).unwrap();
    for _ in 0..5 {
        assert_eq!(bpmn_lite::compile(ORDER_PROCESS).unwrap().diagram, first.diagram);
    }
}

#[test]
fn test_published_json_shape() {
    let result = parse_ok(ORDER_PROCESS);
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["processName"], "Order Fulfilment");
    assert_eq!(json["lanes"][0]["id"], "lane_customer");
    assert_eq!(json["lanes"][0]["elements"][0]["type"], "startEvent");
    assert!(json["connections"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c["kind"] == "messageFlow"));
    assert_eq!(json["diagnostics"].as_array().unwrap().len(), 0);
}

const ORDER_PROCESS: &str = "\
:Order Fulfilment

@Customer
  !Start
  place order
  send: Order
  receive: Invoice
  pay

@Shop
  receive: Order
  ?In stock
    +ship goods
    -|Backorder| notify customer -> !End
  send: Invoice
  #Packing_List ship goods
  \"Ships within two days\"
  !End
";
