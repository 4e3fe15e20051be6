// SPDX-License-Identifier: Apache-2.0

extern crate docmatic;

#[test]
fn test_readme() {
    docmatic::Assert::default().test_file("README.md");
}
