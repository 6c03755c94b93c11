pub const VIEWER_QUERY: &str = r#"
query {
  viewer {
    login
  }
  rateLimit {
    remaining
    limit
    resetAt
  }
}
"#;

pub const SEARCH_PRS_QUERY: &str = r#"
query($query: String!, $first: Int!, $cursor: String) {
  search(query: $query, type: ISSUE, first: $first, after: $cursor) {
    issueCount
    pageInfo {
      hasNextPage
      endCursor
    }
    nodes {
      ... on PullRequest {
        id
        number
        title
        url
        isDraft
        createdAt
        updatedAt
        author { login }
        repository {
          name
          owner { login }
        }
        headRefOid
        mergeable
        mergeStateStatus
        reviewRequests(first: 20) {
          nodes {
            requestedReviewer {
              ... on User { login }
              ... on Team { slug }
              ... on Mannequin { login }
            }
          }
        }
        assignees(first: 20) {
          nodes { login }
        }
        commits(last: 1) {
          nodes {
            commit {
              oid
              checkSuites(first: 20) {
                nodes {
                  app { slug }
                  checkRuns(first: 50) {
                    nodes {
                      id
                      name
                      status
                      conclusion
                      startedAt
                      completedAt
                      detailsUrl
                    }
                  }
                }
              }
              status {
                contexts {
                  id
                  state
                  description
                  targetUrl
                  context
                  createdAt
                  creator { login }
                }
              }
            }
          }
        }
      }
    }
  }
  rateLimit {
    remaining
    limit
    resetAt
  }
}
"#;
