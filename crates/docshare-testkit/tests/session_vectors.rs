//! Scenario vectors played through live sessions.

use docshare::document::Document;
use docshare_testkit::vectors::all_vectors;
use docshare_testkit::TwoPartyFixture;

#[test]
fn test_vectors_converge_through_sessions() {
    for vector in all_vectors() {
        let fixture = TwoPartyFixture::sharing(vector.base);
        let (i, r) = (vector.initiator, vector.receiver);

        fixture.alice_doc.replace(i.position, i.delete_len, i.text).unwrap();
        fixture.bob_doc.replace(r.position, r.delete_len, r.text).unwrap();
        fixture.pump();

        assert_eq!(fixture.alice_doc.text(), vector.expected, "alice, vector '{}'", vector.name);
        assert_eq!(fixture.bob_doc.text(), vector.expected, "bob, vector '{}'", vector.name);
    }
}

#[test]
fn test_vectors_json_lists_every_vector() {
    let json = docshare_testkit::vectors::vectors_json().unwrap();
    for vector in all_vectors() {
        assert!(json.contains(vector.name));
    }
}
