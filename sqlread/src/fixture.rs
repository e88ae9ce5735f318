//! The table every run reads from.
//!
//! It is provisioned by hand before benchmarking; nothing in this crate runs
//! [`CREATE_TABLE_SQL`].

/// T-SQL that creates `dbo.test_table` with 50,000,000 sequential rows and its primary key.
pub const CREATE_TABLE_SQL: &str = "\
DROP TABLE IF EXISTS dbo.test_table;
WITH t1(n) AS
(
    SELECT NULL UNION ALL SELECT NULL UNION ALL SELECT NULL UNION ALL SELECT NULL UNION ALL SELECT NULL
        UNION ALL SELECT NULL UNION ALL SELECT NULL UNION ALL SELECT NULL UNION ALL SELECT NULL UNION ALL SELECT NULL
)
, t2(n) AS
(
    SELECT NULL FROM t1 AS t1, t1 AS t2, t1 AS t3, t1 AS t4, t1 AS t5, t1 AS t6, t1 AS t7, t1 AS t8, t1 AS t9
)
, t3(n) AS
(
    SELECT TOP 50000000 ROW_NUMBER() OVER (ORDER BY (SELECT NULL)) FROM t2
)
SELECT
    ID = ISNULL(t.n, 0),
    c1 = CAST(t.n AS VARCHAR(12)),
    d1 = DATEADD(MINUTE, t.n, '1970-01-01')
INTO dbo.test_table FROM t3 AS t;
ALTER TABLE dbo.test_table ADD CONSTRAINT PK_test_table PRIMARY KEY(ID);
";
